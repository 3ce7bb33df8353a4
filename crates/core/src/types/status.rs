//! Status enums for chat messages and ad events.

use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
    /// A sponsored message injected between turns.
    Ad,
}

impl Sender {
    /// Lower-case name, used as a CSS modifier in the chat templates.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::Ad => "ad",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events recorded for a sponsored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ad_event", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdEvent {
    Shown,
    Clicked,
    Dismissed,
}

impl std::fmt::Display for AdEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shown => write!(f, "shown"),
            Self::Clicked => write!(f, "clicked"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl std::str::FromStr for AdEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shown" => Ok(Self::Shown),
            "clicked" => Ok(Self::Clicked),
            "dismissed" => Ok(Self::Dismissed),
            _ => Err(format!("invalid ad event: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ad_event_round_trips_through_str() {
        for event in [AdEvent::Shown, AdEvent::Clicked, AdEvent::Dismissed] {
            assert_eq!(event.to_string().parse::<AdEvent>(), Ok(event));
        }
        assert!("viewed".parse::<AdEvent>().is_err());
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let json = serde_json::to_string(&Sender::Bot).expect("serialize");
        assert_eq!(json, "\"bot\"");
    }
}
