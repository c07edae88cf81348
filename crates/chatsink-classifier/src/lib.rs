//! # chatsink-classifier — separating dialogue from capture artifacts
//!
//! Scraping chat UIs produces three recurring artifacts: UI chrome captured
//! as if it were a message, the same message delivered more than once, and
//! streaming replies captured mid-stream. [`IngestClassifier::classify`]
//! decides, for one candidate event and the tail of the filtered log, where
//! the event belongs.
//!
//! Rules run in a fixed order and the first one that matches decides:
//!
//! 1. structural noise ([`noise`])
//! 2. exact duplicate inside the role's window
//! 3. single-character prefix echo, in either direction
//! 4. streaming prefix superseded by the complete reply
//! 5. long-horizon repeat of already-seen content
//!
//! An upstream noise flag in the event's hints then overrides any decision
//! that would have admitted the event.

pub mod config;
pub mod disposition;
pub mod noise;
mod rules;

use chatsink_model::Event;
use thiserror::Error;

pub use config::ClassifierConfig;
pub use disposition::{AmendReason, Amendment, Disposition, Suppression};
pub use noise::{NoiseFilter, NoiseKind};

use crate::rules::StrayPrefix;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid noise pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct IngestClassifier {
    config: ClassifierConfig,
    noise: NoiseFilter,
}

impl IngestClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        Ok(Self {
            config,
            noise: NoiseFilter::new()?,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies `candidate` against `history`, the tail of the filtered
    /// log in write order. An empty history admits anything that is not
    /// noise.
    pub fn classify(&self, candidate: &Event, history: &[Event]) -> Disposition {
        let disposition = self.apply_rules(candidate, history);

        if candidate.metadata.preclassified_noise && disposition.is_filtered() {
            return Disposition::VerboseOnly(Suppression::AdvisoryNoise {
                reasons: candidate.metadata.noise_reasons.clone(),
            });
        }
        disposition
    }

    fn apply_rules(&self, candidate: &Event, history: &[Event]) -> Disposition {
        if let Some(kind) = self.noise.check(candidate) {
            return Disposition::VerboseOnly(Suppression::Noise(kind));
        }

        if let Some(suppression) = rules::window_duplicate(&self.config, candidate, history) {
            return Disposition::VerboseOnly(suppression);
        }

        match rules::stray_prefix(&self.config, candidate, history) {
            Some(StrayPrefix::Suppress(suppression)) => {
                return Disposition::VerboseOnly(suppression);
            }
            Some(StrayPrefix::Supersede(superseded)) => {
                return Disposition::KeepFilteredAndAmend(Amendment {
                    superseded,
                    reason: AmendReason::StrayPrefix,
                });
            }
            None => {}
        }

        if let Some(superseded) = rules::streaming_prefix(&self.config, candidate, history) {
            return Disposition::KeepFilteredAndAmend(Amendment {
                superseded,
                reason: AmendReason::StreamingPrefix,
            });
        }

        if let Some(suppression) = rules::long_horizon(&self.config, candidate, history) {
            return Disposition::VerboseOnly(suppression);
        }

        Disposition::KeepFiltered
    }
}

#[cfg(test)]
mod tests {
    use chatsink_model::{Event, EventHints, Role};
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    fn user(content: &str, secs: i64) -> Event {
        Event::new("claude", Role::User, content).with_timestamp(at(secs))
    }

    fn assistant(content: &str, secs: i64) -> Event {
        Event::new("claude", Role::Assistant, content).with_timestamp(at(secs))
    }

    fn classifier() -> IngestClassifier {
        IngestClassifier::new(ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn empty_history_admits_dialogue() {
        let disposition = classifier().classify(&user("What is a lifetime?", 0), &[]);
        assert_eq!(disposition, Disposition::KeepFiltered);
    }

    #[test]
    fn noise_wins_over_everything_else() {
        let disposition = classifier().classify(&assistant("All Chats", 0), &[]);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::Noise(NoiseKind::UiChrome))
        );
    }

    #[test]
    fn assistant_duplicate_inside_two_seconds_is_suppressed() {
        let history = vec![assistant("Here is the plan.", 0)];
        let disposition = classifier().classify(&assistant("Here is the plan.", 2), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::WindowDuplicate { seconds: 2 })
        );
    }

    #[test]
    fn assistant_repeat_inside_thirty_seconds_is_suppressed_across_platforms() {
        let history = vec![
            Event::new("chatgpt", Role::Assistant, "Here is the plan.").with_timestamp(at(0)),
        ];
        let disposition = classifier().classify(&assistant("Here is the plan.", 20), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::AssistantRepeat { seconds: 20 })
        );
    }

    #[test]
    fn user_duplicate_inside_five_seconds_is_suppressed() {
        let history = vec![user("testmessage7", 0)];
        let disposition = classifier().classify(&user("testmessage7", 4), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::WindowDuplicate { seconds: 4 })
        );
    }

    #[test]
    fn user_repeat_between_windows_is_a_rapid_repeat() {
        let history = vec![user("testmessage7", 0)];
        let disposition = classifier().classify(&user("testmessage7", 8), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::RapidRepeat { seconds: 8 })
        );
    }

    #[test]
    fn user_repeat_after_ten_seconds_is_admitted() {
        let history = vec![user("testmessage7", 0)];
        let disposition = classifier().classify(&user("testmessage7", 10), &history);
        assert_eq!(disposition, Disposition::KeepFiltered);
    }

    #[test]
    fn historical_replay_is_suppressed_regardless_of_age() {
        let history = vec![user("How do I parse JSON?", 0)];
        let replay = user("How do I parse JSON?", 600).with_hints(EventHints {
            historical: true,
            ..EventHints::default()
        });
        assert_eq!(
            classifier().classify(&replay, &history),
            Disposition::VerboseOnly(Suppression::HistoricalReplay)
        );
    }

    #[test]
    fn prefixed_assistant_echo_of_user_input_is_suppressed() {
        let history = vec![user("testmessage110", 0)];
        let disposition = classifier().classify(&assistant("Jtestmessage110", 3), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::PrefixEcho { prefix: 'J' })
        );
    }

    #[test]
    fn prefixed_echo_rule_is_limited_to_known_platforms() {
        let history =
            vec![Event::new("chatgpt", Role::User, "testmessage110").with_timestamp(at(0))];
        let candidate =
            Event::new("chatgpt", Role::Assistant, "Jtestmessage110").with_timestamp(at(3));
        assert_eq!(classifier().classify(&candidate, &history), Disposition::KeepFiltered);
    }

    #[test]
    fn prefixed_echo_needs_substantial_user_input() {
        let history = vec![user("short one", 0)];
        let disposition = classifier().classify(&assistant("Xshort one", 1), &history);
        assert_eq!(disposition, Disposition::KeepFiltered);
    }

    #[test]
    fn clean_user_input_supersedes_prefixed_user_entry() {
        let history = vec![user("Jtestmessage42", 0)];
        let disposition = classifier().classify(&user("testmessage42", 1), &history);
        assert_eq!(
            disposition,
            Disposition::KeepFilteredAndAmend(Amendment {
                superseded: user("Jtestmessage42", 0),
                reason: AmendReason::StrayPrefix,
            })
        );
    }

    #[test]
    fn clean_user_input_supersedes_prefixed_assistant_echo() {
        let history = vec![assistant("Jtestmessage42", 0)];
        let disposition = classifier().classify(&user("testmessage42", 1), &history);
        assert_eq!(
            disposition.amendment().map(|a| &a.superseded),
            Some(&assistant("Jtestmessage42", 0))
        );
    }

    #[test]
    fn streaming_prefix_is_superseded_by_complete_reply() {
        let history = vec![user("What is the answer?", 0), assistant("The answer is", 1)];
        let disposition = classifier().classify(&assistant("The answer is 42.", 4), &history);
        assert_eq!(
            disposition,
            Disposition::KeepFilteredAndAmend(Amendment {
                superseded: assistant("The answer is", 1),
                reason: AmendReason::StreamingPrefix,
            })
        );
    }

    #[test]
    fn stale_or_tiny_prefixes_are_left_alone() {
        let stale = vec![assistant("The answer is", 0)];
        assert_eq!(
            classifier().classify(&assistant("The answer is 42.", 6), &stale),
            Disposition::KeepFiltered
        );

        let tiny = vec![assistant("Th", 0)];
        assert_eq!(
            classifier().classify(&assistant("The answer is 42.", 1), &tiny),
            Disposition::KeepFiltered
        );
    }

    #[test]
    fn prefix_in_the_same_second_is_not_a_streaming_capture() {
        let history = vec![assistant("The answer is", 0)];
        let disposition = classifier().classify(&assistant("The answer is 42.", 0), &history);
        assert_eq!(disposition, Disposition::KeepFiltered);
    }

    #[test]
    fn assistant_repeat_echoing_recent_user_input_is_admitted() {
        let classifier = IngestClassifier::new(ClassifierConfig {
            assistant_repeat_window_secs: 2,
            ..ClassifierConfig::default()
        })
        .unwrap();
        let reply = "Sure, tell me about rust now";

        let history = vec![user("tell me about rust", 0), assistant(reply, 1)];
        assert_eq!(
            classifier.classify(&assistant(reply, 5), &history),
            Disposition::KeepFiltered
        );

        let without_user = vec![assistant(reply, 1)];
        assert_eq!(
            classifier.classify(&assistant(reply, 5), &without_user),
            Disposition::VerboseOnly(Suppression::RapidRepeat { seconds: 4 })
        );
    }

    #[test]
    fn assistant_exactly_restating_fresh_user_input_is_an_echo() {
        let history = vec![user("Summarise this article", 0)];
        let disposition = classifier().classify(&assistant("Summarise this article", 3), &history);
        assert_eq!(
            disposition,
            Disposition::VerboseOnly(Suppression::UserInputEcho { seconds: 3 })
        );
    }

    #[test]
    fn advisory_noise_flag_overrides_admission() {
        let candidate = assistant("A perfectly normal reply.", 0).with_hints(EventHints {
            preclassified_noise: true,
            noise_reasons: vec!["hidden_element".to_owned()],
            ..EventHints::default()
        });
        assert_eq!(
            classifier().classify(&candidate, &[]),
            Disposition::VerboseOnly(Suppression::AdvisoryNoise {
                reasons: vec!["hidden_element".to_owned()],
            })
        );
    }

    #[test]
    fn advisory_noise_flag_drops_pending_amendment() {
        let history = vec![assistant("The answer is", 0)];
        let candidate = assistant("The answer is 42.", 1).with_hints(EventHints {
            preclassified_noise: true,
            ..EventHints::default()
        });
        let disposition = classifier().classify(&candidate, &history);
        assert!(!disposition.is_filtered());
        assert!(disposition.amendment().is_none());
    }

    #[test]
    fn reclassifying_noise_is_stable() {
        let classifier = classifier();
        let event = assistant("Claude can make mistakes", 0);
        let first = classifier.classify(&event, &[]);
        let second = classifier.classify(&event, &[]);
        assert_eq!(first, second);
        assert!(!first.is_filtered());
    }
}
