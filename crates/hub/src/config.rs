//! Configuration for the hub.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Default wttr.in one-line report for the studio.
pub const DEFAULT_WEATHER_URL: &str = "https://wttr.in/~Vanderbilt%20University?format=1";

/// Hub configuration. Fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Shared secret the poller sends as `key`.
    pub api_key: String,
    /// Resend period for idle subscribers; below the 55s idle cut of common proxies.
    pub keepalive: Duration,
    /// Total wall-clock budget for one fan-out round.
    pub fanout_budget: Duration,
    /// Cached payloads read as `{}` once the last authenticated contact is older than this.
    pub staleness: Duration,
    pub shifts_csv_url: Option<String>,
    pub roster_refresh: Duration,
    pub weather_url: String,
    pub weather_refresh: Duration,
    /// Site time zone as a fixed UTC offset, in hours.
    pub site_utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);
        let api_key = std::env::var("X_API_KEY").map_err(|_| std::env::VarError::NotPresent)?;
        if api_key.is_empty() {
            return Err(std::env::VarError::NotPresent);
        }
        let shifts_csv_url = std::env::var("SHIFTS_CSV_EXPORT_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let weather_url =
            std::env::var("WEATHER_URL").unwrap_or_else(|_| DEFAULT_WEATHER_URL.to_string());
        let site_utc_offset_hours = std::env::var("SITE_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|h: &i32| (-23..=23).contains(h))
            .unwrap_or(-5);

        Ok(Self {
            host,
            port,
            api_key,
            keepalive: secs_from_env("KEEPALIVE_SECS", 50),
            fanout_budget: secs_from_env("FANOUT_BUDGET_SECS", 5),
            staleness: secs_from_env("STALENESS_SECS", 30),
            shifts_csv_url,
            roster_refresh: secs_from_env("ROSTER_REFRESH_SECS", 15 * 60),
            weather_url,
            weather_refresh: secs_from_env("WEATHER_REFRESH_SECS", 60),
            site_utc_offset_hours,
        })
    }

    /// Site time zone as a chrono offset; UTC if the configured hours are out of range.
    pub fn site_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.site_utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Config with the production timings and no outside collaborators.
    pub fn for_test(api_key: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            api_key: api_key.to_string(),
            keepalive: Duration::from_secs(50),
            fanout_budget: Duration::from_secs(5),
            staleness: Duration::from_secs(30),
            shifts_csv_url: None,
            roster_refresh: Duration::from_secs(15 * 60),
            weather_url: String::new(),
            weather_refresh: Duration::from_secs(60),
            site_utc_offset_hours: -5,
        }
    }
}

fn secs_from_env(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}
