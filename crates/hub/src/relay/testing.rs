//! Test doubles for connections and collaborators.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use futures_util::sink;
use shared::{Channel, DayHours};
use tokio::sync::mpsc;

use super::connection::Connection;
use super::Hub;
use crate::config::Config;
use crate::derive::{Deriver, DutyRoster, WeatherSource};
use crate::error::HubError;

pub const TEST_KEY: &str = "studio-test-key";

/// Connection whose sends land in an unbounded channel.
pub fn recording_conn(channel: Channel) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = sink::unfold(tx, |tx, text: String| async move {
        tx.send(text)
            .map_err(|_| HubError::Delivery("receiver dropped".to_string()))?;
        Ok::<_, HubError>(tx)
    });
    (Connection::new(channel, sink), rx)
}

/// Connection whose every send fails.
pub fn failing_conn(channel: Channel) -> Arc<Connection> {
    let sink = sink::unfold((), |(), _text: String| async move {
        Err::<(), _>(HubError::Delivery("broken pipe".to_string()))
    });
    Connection::new(channel, sink)
}

/// Connection whose sends never complete.
pub fn hanging_conn(channel: Channel) -> Arc<Connection> {
    let sink = sink::unfold((), |(), _text: String| async move {
        std::future::pending::<Result<(), HubError>>().await
    });
    Connection::new(channel, sink)
}

pub fn open(conn: Arc<Connection>) -> Arc<Connection> {
    conn.mark_open();
    conn
}

/// Roster with a fixed on-duty list and fixed hours.
pub struct FixedRoster {
    pub on_duty: Vec<String>,
    pub hours: Vec<DayHours>,
}

impl FixedRoster {
    pub fn with_mentors(names: &[&str]) -> Self {
        Self {
            on_duty: names.iter().map(|n| n.to_string()).collect(),
            hours: vec![DayHours {
                day: "Monday".to_string(),
                ranges: vec!["10:00 AM - 2:00 PM".to_string()],
            }],
        }
    }
}

impl DutyRoster for FixedRoster {
    fn mentors_on_duty(&self, _now: DateTime<FixedOffset>) -> anyhow::Result<Vec<String>> {
        Ok(self.on_duty.clone())
    }

    fn open_hours(&self) -> anyhow::Result<Vec<DayHours>> {
        Ok(self.hours.clone())
    }
}

/// Roster that has never loaded.
pub struct FailingRoster;

impl DutyRoster for FailingRoster {
    fn mentors_on_duty(&self, _now: DateTime<FixedOffset>) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("shift table not loaded")
    }

    fn open_hours(&self) -> anyhow::Result<Vec<DayHours>> {
        anyhow::bail!("shift table not loaded")
    }
}

pub struct FixedWeather(pub &'static str);

impl WeatherSource for FixedWeather {
    fn current(&self) -> String {
        self.0.to_string()
    }
}

pub fn test_hub(roster: impl DutyRoster + 'static) -> Hub {
    let config = Arc::new(Config::for_test(TEST_KEY));
    let deriver = Deriver::new(
        Arc::new(roster),
        Arc::new(FixedWeather("+73°F")),
        config.site_offset(),
    );
    Hub::new(config, deriver)
}

/// Producer frame text with the test key.
pub fn frame(body: serde_json::Value) -> String {
    let mut body = body;
    body["key"] = serde_json::Value::String(TEST_KEY.to_string());
    body.to_string()
}
