//! Named rolling logs kept in the sink's working directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SinkError;

/// Identifier of one rolling log file.
///
/// `Verbose`, `Filtered` and `Recent` hold captured chat events.
/// `Diagnostic` and `Analytics` hold free-form records posted by the
/// capture scripts and are never read back by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogId {
    Verbose,
    Filtered,
    Recent,
    Diagnostic,
    Analytics,
}

impl LogId {
    /// Logs that carry chat events, in write order.
    pub const EVENT_LOGS: [LogId; 3] = [LogId::Verbose, LogId::Recent, LogId::Filtered];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Verbose => "chatverbose.log",
            Self::Filtered => "chat.log",
            Self::Recent => "recent.ndjson",
            Self::Diagnostic => "diagnostic.ndjson",
            Self::Analytics => "analytics.ndjson",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Filtered => "filtered",
            Self::Recent => "recent",
            Self::Diagnostic => "diagnostic",
            Self::Analytics => "analytics",
        }
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogId {
    type Err = SinkError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "filtered" => Ok(Self::Filtered),
            "recent" => Ok(Self::Recent),
            "diagnostic" => Ok(Self::Diagnostic),
            "analytics" => Ok(Self::Analytics),
            other => Err(SinkError::UnknownLog(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_id_parses_case_insensitively() {
        let id: LogId = "Filtered".parse().unwrap();
        assert_eq!(id, LogId::Filtered);
        assert_eq!(id.file_name(), "chat.log");
    }

    #[test]
    fn log_id_rejects_unknown_name() {
        let err = "chatlog".parse::<LogId>().unwrap_err();
        assert_eq!(err.to_string(), "unknown log: chatlog");
    }
}
