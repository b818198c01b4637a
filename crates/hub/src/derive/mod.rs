//! Per-channel payload derivation and the collaborators it consumes.

mod duty;
mod sign;
mod weather;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use shared::{Channel, DayHours, HoursPayload, PrintersPayload, ProducerReport, SignPayload};

pub use duty::{Shift, SheetRoster, ShiftTable};
pub use sign::decide_open_state;
pub use weather::{NoWeather, WttrWeather};

use crate::error::HubError;

/// Who is on duty and when the space is staffed.
pub trait DutyRoster: Send + Sync {
    /// Names on duty at `now`, in roster order. Duplicates are kept.
    fn mentors_on_duty(&self, now: DateTime<FixedOffset>) -> anyhow::Result<Vec<String>>;

    /// Staffed ranges for each weekday, Monday first.
    fn open_hours(&self) -> anyhow::Result<Vec<DayHours>>;
}

/// Outside conditions as a short display string. Empty when unknown.
pub trait WeatherSource: Send + Sync {
    fn current(&self) -> String;
}

/// Turns one producer report into the serialized payload of each outbound channel.
pub struct Deriver {
    roster: Arc<dyn DutyRoster>,
    weather: Arc<dyn WeatherSource>,
    offset: FixedOffset,
}

impl Deriver {
    pub fn new(
        roster: Arc<dyn DutyRoster>,
        weather: Arc<dyn WeatherSource>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            roster,
            weather,
            offset,
        }
    }

    /// Current wall-clock time at the site.
    pub fn site_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn derive(
        &self,
        channel: Channel,
        report: &ProducerReport,
        now: DateTime<FixedOffset>,
    ) -> Result<String, HubError> {
        let serialized = match channel {
            Channel::Printers => self.printers(report),
            Channel::Sign => self.sign(report, now),
            Channel::Hours => self.hours(),
            Channel::Poller => Err(anyhow::anyhow!("inbound channel has no payload")),
        };
        serialized.map_err(|source| HubError::Derivation { channel, source })
    }

    fn printers(&self, report: &ProducerReport) -> anyhow::Result<String> {
        let printers = report
            .printers
            .clone()
            .context("report carries no printers field")?;
        Ok(serde_json::to_string(&PrintersPayload { printers })?)
    }

    fn sign(&self, report: &ProducerReport, now: DateTime<FixedOffset>) -> anyhow::Result<String> {
        let mentors = self
            .roster
            .mentors_on_duty(now)
            .context("looking up mentors on duty")?;
        let state = decide_open_state(report.sign.as_ref(), &mentors);
        let payload = SignPayload {
            state,
            open: state.is_open(),
            mentors,
            weather: self.weather.current(),
        };
        Ok(serde_json::to_string(&payload)?)
    }

    fn hours(&self) -> anyhow::Result<String> {
        let hours = self.roster.open_hours().context("computing open hours")?;
        Ok(serde_json::to_string(&HoursPayload { hours })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{FailingRoster, FixedRoster, FixedWeather};
    use serde_json::json;
    use shared::{OpenState, SignReport, SwitchState};

    fn deriver(roster: impl DutyRoster + 'static) -> Deriver {
        Deriver::new(
            Arc::new(roster),
            Arc::new(FixedWeather("☀️ +70°F")),
            FixedOffset::west_opt(5 * 3600).unwrap(),
        )
    }

    fn open_report() -> ProducerReport {
        ProducerReport {
            printers: Some(json!({"mk4": {"state": "idle"}})),
            sign: Some(SignReport {
                door: 0,
                switch: SwitchState {
                    one_on: 1,
                    two_on: 0,
                },
            }),
        }
    }

    #[test]
    fn printers_payload_wraps_report() {
        let d = deriver(FixedRoster::with_mentors(&[]));
        let out = d
            .derive(Channel::Printers, &open_report(), d.site_now())
            .unwrap();
        assert_eq!(out, r#"{"printers":{"mk4":{"state":"idle"}}}"#);
    }

    #[test]
    fn sign_payload_carries_state_mentors_weather() {
        let d = deriver(FixedRoster::with_mentors(&["Ada", "Ada"]));
        let out = d.derive(Channel::Sign, &open_report(), d.site_now()).unwrap();
        let payload: SignPayload = serde_json::from_str(&out).unwrap();
        assert_eq!(payload.state, OpenState::Open);
        assert!(payload.open);
        assert_eq!(payload.mentors, vec!["Ada", "Ada"]);
        assert_eq!(payload.weather, "☀️ +70°F");
    }

    #[test]
    fn hours_payload_lists_days() {
        let d = deriver(FixedRoster::with_mentors(&[]));
        let out = d
            .derive(Channel::Hours, &ProducerReport::default(), d.site_now())
            .unwrap();
        assert_eq!(
            out,
            r#"{"hours":[{"day":"Monday","ranges":["10:00 AM - 2:00 PM"]}]}"#
        );
    }

    #[test]
    fn roster_failure_names_channel() {
        let d = deriver(FailingRoster);
        let err = d
            .derive(Channel::Sign, &open_report(), d.site_now())
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Derivation {
                channel: Channel::Sign,
                ..
            }
        ));
        assert!(d.derive(Channel::Printers, &open_report(), d.site_now()).is_ok());
    }

    #[test]
    fn inbound_channel_has_no_rule() {
        let d = deriver(FixedRoster::with_mentors(&[]));
        assert!(d
            .derive(Channel::Poller, &open_report(), d.site_now())
            .is_err());
    }
}
