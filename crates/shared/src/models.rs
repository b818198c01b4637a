//! Shared wire models: channels, producer reports and subscriber payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical broadcast channel.
///
/// `Poller` is the inbound producer endpoint; the rest are outbound views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Poller,
    Printers,
    Sign,
    Hours,
}

impl Channel {
    /// Outbound channels, in slot order.
    pub const OUTBOUND: [Channel; 3] = [Channel::Printers, Channel::Sign, Channel::Hours];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poller => "poller",
            Self::Printers => "printers",
            Self::Sign => "sign",
            Self::Hours => "hours",
        }
    }

    /// Route path a connection uses to reach this channel.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Poller => "/poller",
            Self::Printers => "/printers",
            Self::Sign => "/sign",
            Self::Hours => "/hours",
        }
    }

    /// Index into per-channel slot arrays. `None` for the inbound channel.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::Poller => None,
            Self::Printers => Some(0),
            Self::Sign => Some(1),
            Self::Hours => Some(2),
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.slot().is_some()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Producer report ---

/// Raw state pushed by the poller. `key` is checked before this is decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printers: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignReport>,
}

/// Door contact and front-panel switch state.
///
/// `door == 1` means the door is shut, `door == 0` means it is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignReport {
    #[serde(default)]
    pub door: u8,
    #[serde(default)]
    pub switch: SwitchState,
}

impl SignReport {
    pub fn door_shut(&self) -> bool {
        self.door == 1
    }
}

/// Two-position sign switch: `one_on` follows the schedule, `two_on` forces open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    #[serde(default)]
    pub one_on: u8,
    #[serde(default)]
    pub two_on: u8,
}

/// Producer frame as sent on the wire: the report plus the shared key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerFrame {
    pub key: String,
    #[serde(flatten)]
    pub report: ProducerReport,
}

// --- Subscriber payloads ---

/// Open/closed decision shown on the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenState {
    Closed,
    Open,
    ForceOpen,
    ForceClose,
}

impl OpenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::ForceOpen => "FORCE_OPEN",
            Self::ForceClose => "FORCE_CLOSE",
        }
    }

    /// Whether the space should read as open to visitors.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::ForceOpen)
    }
}

/// SIGN channel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignPayload {
    pub state: OpenState,
    pub open: bool,
    pub mentors: Vec<String>,
    pub weather: String,
}

/// PRINTERS channel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintersPayload {
    pub printers: serde_json::Value,
}

/// Formatted open ranges for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub day: String,
    pub ranges: Vec<String>,
}

/// HOURS channel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoursPayload {
    pub hours: Vec<DayHours>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_channels_have_distinct_slots() {
        let slots: Vec<usize> = Channel::OUTBOUND
            .iter()
            .map(|c| c.slot().unwrap())
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(Channel::Poller.slot().is_none());
        assert!(!Channel::Poller.is_outbound());
    }

    #[test]
    fn channel_paths() {
        assert_eq!(Channel::Poller.path(), "/poller");
        assert_eq!(Channel::Sign.path(), "/sign");
        assert_eq!(Channel::Hours.to_string(), "hours");
    }

    #[test]
    fn producer_frame_parses_nested_switch() {
        let raw = json!({
            "key": "secret",
            "printers": {"mk3": "idle"},
            "sign": {"door": 0, "switch": {"one_on": 1, "two_on": 0}}
        });
        let frame: ProducerFrame = serde_json::from_value(raw).unwrap();
        assert_eq!(frame.key, "secret");
        let sign = frame.report.sign.unwrap();
        assert!(!sign.door_shut());
        assert_eq!(sign.switch.one_on, 1);
        assert_eq!(sign.switch.two_on, 0);
        assert_eq!(frame.report.printers, Some(json!({"mk3": "idle"})));
    }

    #[test]
    fn producer_report_tolerates_missing_fields() {
        let report: ProducerReport = serde_json::from_value(json!({"sign": {"door": 1}})).unwrap();
        assert!(report.printers.is_none());
        let sign = report.sign.unwrap();
        assert!(sign.door_shut());
        assert_eq!(sign.switch, SwitchState::default());
    }

    #[test]
    fn producer_report_rejects_wrong_types() {
        let res: Result<ProducerReport, _> =
            serde_json::from_value(json!({"sign": {"door": "open"}}));
        assert!(res.is_err());
    }

    #[test]
    fn open_state_serializes_screaming() {
        let json = serde_json::to_string(&OpenState::ForceClose).unwrap();
        assert_eq!(json, "\"FORCE_CLOSE\"");
        assert_eq!(OpenState::ForceOpen.as_str(), "FORCE_OPEN");
        assert!(OpenState::ForceOpen.is_open());
        assert!(!OpenState::ForceClose.is_open());
    }

    #[test]
    fn sign_payload_field_order_is_stable() {
        let payload = SignPayload {
            state: OpenState::Open,
            open: true,
            mentors: vec!["Ada".to_string()],
            weather: String::new(),
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"state":"OPEN","open":true,"mentors":["Ada"],"weather":""}"#
        );
    }
}
