//! History-dependent rules: duplicates, echoes and streaming prefixes.
//!
//! `history` is always the tail of the filtered log, oldest first. Entries
//! from other platforms are ignored except where noted.

use chatsink_model::{Event, Role};

use crate::config::ClassifierConfig;
use crate::disposition::Suppression;

pub(crate) enum StrayPrefix {
    Suppress(Suppression),
    Supersede(Event),
}

fn tail(history: &[Event], depth: usize) -> &[Event] {
    &history[history.len().saturating_sub(depth)..]
}

/// Splits off the first character, if there is one.
fn split_first_char(content: &str) -> Option<(char, &str)> {
    let mut chars = content.chars();
    let first = chars.next()?;
    Some((first, chars.as_str()))
}

pub(crate) fn window_duplicate(
    config: &ClassifierConfig,
    candidate: &Event,
    history: &[Event],
) -> Option<Suppression> {
    let window = config.duplicate_window_secs(candidate.role);

    for entry in tail(history, config.history_depth).iter().rev() {
        if entry.content != candidate.content {
            continue;
        }
        let seconds = candidate.seconds_since(entry);

        if entry.role == candidate.role
            && entry.platform == candidate.platform
            && seconds.abs() <= window
        {
            return Some(Suppression::WindowDuplicate { seconds });
        }

        // Cross-platform on purpose: the same reply observed twice.
        if candidate.role == Role::Assistant
            && entry.role == Role::Assistant
            && seconds.abs() <= config.assistant_repeat_window_secs
        {
            return Some(Suppression::AssistantRepeat { seconds });
        }
    }
    None
}

pub(crate) fn stray_prefix(
    config: &ClassifierConfig,
    candidate: &Event,
    history: &[Event],
) -> Option<StrayPrefix> {
    let window = 0..=config.prefix_echo_window_secs;

    match candidate.role {
        Role::Assistant => {
            if !config.prefix_echo_applies_to(&candidate.platform) {
                return None;
            }
            let (prefix, rest) = split_first_char(&candidate.content)?;

            tail(history, config.prefix_echo_scan_depth)
                .iter()
                .rev()
                .filter(|entry| entry.role == Role::User && entry.platform == candidate.platform)
                .find(|user| {
                    window.contains(&candidate.seconds_since(user))
                        && user.char_len() >= config.prefix_echo_min_chars
                        && user.content == rest
                })
                .map(|_| StrayPrefix::Suppress(Suppression::PrefixEcho { prefix }))
        }
        Role::User => {
            if candidate.content.is_empty() {
                return None;
            }
            let recent = tail(history, config.history_depth);
            let matches_candidate = |entry: &Event| {
                split_first_char(&entry.content).is_some_and(|(_, rest)| rest == candidate.content)
            };

            // The prefixed echo of this input may have been logged as an
            // assistant turn just before the clean user turn arrived.
            let previous = recent
                .iter()
                .rev()
                .find(|entry| entry.platform == candidate.platform)?;
            if previous.role == Role::Assistant
                && candidate.char_len() >= config.prefix_echo_min_chars
                && window.contains(&candidate.seconds_since(previous))
                && matches_candidate(previous)
            {
                return Some(StrayPrefix::Supersede(previous.clone()));
            }

            recent
                .iter()
                .rev()
                .find(|entry| entry.role == Role::User && entry.platform == candidate.platform)
                .filter(|previous_user| matches_candidate(*previous_user))
                .map(|previous_user| StrayPrefix::Supersede(previous_user.clone()))
        }
    }
}

pub(crate) fn streaming_prefix(
    config: &ClassifierConfig,
    candidate: &Event,
    history: &[Event],
) -> Option<Event> {
    if candidate.role != Role::Assistant {
        return None;
    }
    // Strictly after the prefix: two captures in the same second are distinct.
    let window = 1..=config.streaming_window_secs;
    let candidate_len = candidate.char_len();

    tail(history, config.streaming_scan_depth)
        .iter()
        .filter(|entry| entry.role == Role::Assistant && entry.platform == candidate.platform)
        .find(|entry| {
            let entry_len = entry.char_len();
            window.contains(&candidate.seconds_since(entry))
                && entry_len >= config.streaming_min_prefix_chars
                && candidate_len > entry_len
                && candidate.content.starts_with(&entry.content)
        })
        .cloned()
}

pub(crate) fn long_horizon(
    config: &ClassifierConfig,
    candidate: &Event,
    history: &[Event],
) -> Option<Suppression> {
    let first_seen = history.iter().find(|entry| {
        entry.timestamp != candidate.timestamp
            && entry.platform == candidate.platform
            && entry.role == candidate.role
            && entry.content == candidate.content
    });

    let Some(first_seen) = first_seen else {
        return user_input_echo(config, candidate, history);
    };

    if candidate.metadata.historical {
        return Some(Suppression::HistoricalReplay);
    }

    let seconds = candidate.seconds_since(first_seen);
    if seconds >= config.rapid_repeat_secs {
        return None;
    }
    if candidate.role == Role::Assistant && echoes_recent_user(config, candidate, history) {
        return None;
    }
    Some(Suppression::RapidRepeat { seconds })
}

/// An assistant turn restating something the user said moments ago.
fn echoes_recent_user(config: &ClassifierConfig, candidate: &Event, history: &[Event]) -> bool {
    let window = 0..=config.echo_window_secs;
    let candidate_lower = candidate.content.to_lowercase();

    tail(history, config.echo_scan_depth)
        .iter()
        .filter(|entry| entry.role == Role::User && entry.platform == candidate.platform)
        .any(|user| {
            window.contains(&candidate.seconds_since(user))
                && !user.content.is_empty()
                && (user.content == candidate.content
                    || candidate_lower.contains(&user.content.to_lowercase()))
        })
}

fn user_input_echo(
    config: &ClassifierConfig,
    candidate: &Event,
    history: &[Event],
) -> Option<Suppression> {
    if !config.flag_user_input_echo || candidate.role != Role::Assistant {
        return None;
    }
    let window = 0..=config.user_input_echo_window_secs;
    let content = candidate.content.trim();

    tail(history, config.user_input_echo_scan_depth)
        .iter()
        .rev()
        .filter(|entry| entry.role == Role::User && entry.platform == candidate.platform)
        .map(|user| (user, candidate.seconds_since(user)))
        .find(|(user, seconds)| window.contains(seconds) && user.content.trim() == content)
        .map(|(_, seconds)| Suppression::UserInputEcho { seconds })
}

#[cfg(test)]
mod tests {
    use chatsink_model::{Event, EventHints, Role};
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn long_horizon_ignores_entries_from_the_same_instant() {
        let config = ClassifierConfig::default();
        let history =
            vec![Event::new("claude", Role::User, "How do I parse JSON?").with_timestamp(at(0))];
        let replay = Event::new("claude", Role::User, "How do I parse JSON?")
            .with_timestamp(at(0))
            .with_hints(EventHints {
                historical: true,
                ..EventHints::default()
            });

        assert_eq!(long_horizon(&config, &replay, &history), None);
        assert_eq!(
            long_horizon(&config, &replay.clone().with_timestamp(at(1)), &history),
            Some(Suppression::HistoricalReplay)
        );
    }
}
