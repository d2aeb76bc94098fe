//! Event type enum as the single source of truth for event type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical event types for activity tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    SessionStart,
    SessionEnd,
    ToolStart,
    ToolEnd,
    Commit,
}

impl EventType {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::ToolStart => "tool_start",
            Self::ToolEnd => "tool_end",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session_start" => Ok(Self::SessionStart),
            "session_end" | "stop" => Ok(Self::SessionEnd),
            "tool_start" | "pre_tool_use" => Ok(Self::ToolStart),
            "tool_end" | "post_tool_use" => Ok(Self::ToolEnd),
            "commit" | "post_commit" => Ok(Self::Commit),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        let variants = [
            EventType::SessionStart,
            EventType::SessionEnd,
            EventType::ToolStart,
            EventType::ToolEnd,
            EventType::Commit,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed: EventType = s.parse().expect("should parse");
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn hook_aliases_parse() {
        let pre: EventType = "pre_tool_use".parse().expect("should parse");
        assert_eq!(pre, EventType::ToolStart);

        let post: EventType = "post_tool_use".parse().expect("should parse");
        assert_eq!(post, EventType::ToolEnd);

        let stop: EventType = "stop".parse().expect("should parse");
        assert_eq!(stop, EventType::SessionEnd);
    }

    #[test]
    fn unknown_type_errors() {
        let result: Result<EventType, _> = "unknown_type".parse();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "unknown event type: unknown_type");
    }
}
