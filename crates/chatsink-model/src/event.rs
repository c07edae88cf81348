//! Captured chat events and their on-disk shape.
//!
//! One [`Event`] is one line of newline-delimited JSON in every log it is
//! written to. Timestamps have second precision; all windowing decisions are
//! made in whole seconds.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SinkError, SinkResult};

/// Speaker of a captured chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Maps a free-form role label from a capture script onto a [`Role`].
    ///
    /// Anything that is not recognisably the user is treated as the assistant,
    /// which is also the default when no role is sent at all.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("user") {
            Self::User
        } else {
            Self::Assistant
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory signals attached by the capture layer.
///
/// Capture scripts send an open JSON object; only the fields below are
/// recognised and everything else is dropped at the boundary. The classifier
/// treats these as hints, never as authoritative decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct EventHints {
    /// The capture layer re-delivered something it had already seen.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub historical: bool,
    /// The capture layer's own signal processing judged this to be noise.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub preclassified_noise: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub noise_reasons: Vec<String>,
    /// Tool names reported alongside an assistant turn.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl EventHints {
    /// Extracts hints from a raw metadata object.
    ///
    /// Accepts both the stored shape (`historical`, `preclassifiedNoise`,
    /// `noiseReasons`) and the capture scripts' legacy shape
    /// (`signalProcessing.isHistorical`, `signalProcessing.filtered`,
    /// `signalProcessing.filteredBy`, `isSignalNoise`,
    /// `signalProcessingFilter`). Fields of the wrong type are ignored.
    pub fn from_metadata(metadata: &Value) -> Self {
        let Some(object) = metadata.as_object() else {
            return Self::default();
        };
        let signal = object.get("signalProcessing");

        let flag = |value: Option<&Value>| value.and_then(Value::as_bool).unwrap_or(false);

        let historical = flag(object.get("historical"))
            || flag(object.get("isHistorical"))
            || flag(signal.and_then(|s| s.get("isHistorical")));

        let preclassified_noise = flag(object.get("preclassifiedNoise"))
            || flag(object.get("isSignalNoise"))
            || flag(signal.and_then(|s| s.get("filtered")));

        let mut noise_reasons = strings(object.get("noiseReasons"));
        if noise_reasons.is_empty() {
            noise_reasons = strings(signal.and_then(|s| s.get("filteredBy")));
        }
        if noise_reasons.is_empty() {
            noise_reasons = strings(object.get("signalProcessingFilter"));
        }

        Self {
            historical,
            preclassified_noise,
            noise_reasons,
            tools: strings(object.get("tools")),
        }
    }
}

impl From<Value> for EventHints {
    fn from(value: Value) -> Self {
        Self::from_metadata(&value)
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// One captured chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ts", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub platform: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub metadata: EventHints,
}

impl Event {
    /// Creates an event stamped with the current time, truncated to seconds.
    pub fn new(platform: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().trunc_subsecs(0),
            platform: platform.into(),
            role,
            content: content.into(),
            urls: Vec::new(),
            metadata: EventHints::default(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(0);
        self
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_hints(mut self, hints: EventHints) -> Self {
        self.metadata = hints;
        self
    }

    /// Encodes the event as one NDJSON line, without the trailing newline.
    pub fn to_line(&self) -> SinkResult<String> {
        serde_json::to_string(self).map_err(|error| SinkError::Serialization(error.to_string()))
    }

    pub fn from_line(line: &str) -> SinkResult<Self> {
        serde_json::from_str(line).map_err(|error| SinkError::Serialization(error.to_string()))
    }

    /// Content length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Whole seconds from `earlier` to this event. Negative when `earlier`
    /// was actually stamped later.
    pub fn seconds_since(&self, earlier: &Event) -> i64 {
        (self.timestamp - earlier.timestamp).num_seconds()
    }

    /// True when `other` is the same stored capture: same instant, speaker,
    /// platform and text.
    pub fn is_same_capture(&self, other: &Event) -> bool {
        self.timestamp == other.timestamp
            && self.role == other.role
            && self.platform == other.platform
            && self.content == other.content
    }

    /// Leading characters of the content for log lines.
    pub fn preview(&self) -> String {
        const PREVIEW_CHARS: usize = 30;
        let mut preview: String = self.content.chars().take(PREVIEW_CHARS).collect();
        if self.content.chars().nth(PREVIEW_CHARS).is_some() {
            preview.push_str("...");
        }
        preview
    }
}

/// Parses a stored timestamp.
///
/// RFC 3339 is what the sink writes; naive `YYYY-MM-DDTHH:MM:SS` stamps from
/// older logs are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{SecondsFormat, parse_timestamp};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
