use std::fmt;

use chatsink_model::Event;

use crate::noise::NoiseKind;

/// Where a classified event is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Genuine dialogue: verbose, recent and filtered logs.
    KeepFiltered,
    /// Noise or a repeat: verbose and recent logs only.
    VerboseOnly(Suppression),
    /// Genuine dialogue that replaces an entry already in the filtered log.
    KeepFilteredAndAmend(Amendment),
}

impl Disposition {
    pub fn is_filtered(&self) -> bool {
        !matches!(self, Self::VerboseOnly(_))
    }

    pub fn amendment(&self) -> Option<&Amendment> {
        match self {
            Self::KeepFilteredAndAmend(amendment) => Some(amendment),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::KeepFiltered => "keep_filtered",
            Self::VerboseOnly(_) => "verbose_only",
            Self::KeepFilteredAndAmend(_) => "keep_filtered_and_amend",
        }
    }
}

/// Reason an event was kept out of the filtered log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    Noise(NoiseKind),
    /// Same role, platform and content inside the role's duplicate window.
    WindowDuplicate { seconds: i64 },
    /// Identical assistant turn inside the wider assistant repeat window.
    AssistantRepeat { seconds: i64 },
    /// Assistant turn that is a recent user turn with one stray leading character.
    PrefixEcho { prefix: char },
    /// Already-seen content re-delivered by the capture layer as a replay.
    HistoricalReplay,
    /// Already-seen content repeated too quickly to be a new human action.
    RapidRepeat { seconds: i64 },
    /// Assistant turn that restates fresh user input verbatim.
    UserInputEcho { seconds: i64 },
    /// The capture layer flagged the event as noise itself.
    AdvisoryNoise { reasons: Vec<String> },
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noise(kind) => write!(f, "noise:{kind}"),
            Self::WindowDuplicate { seconds } => write!(f, "duplicate within {seconds}s"),
            Self::AssistantRepeat { seconds } => write!(f, "assistant repeat within {seconds}s"),
            Self::PrefixEcho { prefix } => write!(f, "echo of user input with prefix {prefix:?}"),
            Self::HistoricalReplay => f.write_str("historical replay"),
            Self::RapidRepeat { seconds } => write!(f, "repeat after {seconds}s"),
            Self::UserInputEcho { seconds } => write!(f, "user input echo after {seconds}s"),
            Self::AdvisoryNoise { reasons } if reasons.is_empty() => f.write_str("advisory noise"),
            Self::AdvisoryNoise { reasons } => write!(f, "advisory noise: {}", reasons.join(",")),
        }
    }
}

/// Earlier filtered-log entry superseded by the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amendment {
    pub superseded: Event,
    pub reason: AmendReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmendReason {
    /// The earlier entry carried a stray leading character the candidate lacks.
    StrayPrefix,
    /// The earlier entry was a partial capture of a streaming reply.
    StreamingPrefix,
}

impl fmt::Display for AmendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrayPrefix => f.write_str("stray_prefix"),
            Self::StreamingPrefix => f.write_str("streaming_prefix"),
        }
    }
}
