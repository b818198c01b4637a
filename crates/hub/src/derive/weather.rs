//! Outside weather line, fetched from wttr.in and cached.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::WeatherSource;

/// Weather source used when no URL is configured.
pub struct NoWeather;

impl WeatherSource for NoWeather {
    fn current(&self) -> String {
        String::new()
    }
}

/// One-line weather report refreshed in the background. Reads never block on the network.
pub struct WttrWeather {
    url: String,
    client: reqwest::Client,
    latest: RwLock<String>,
}

impl WttrWeather {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
            latest: RwLock::new(String::new()),
        })
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        let res = self.client.get(&self.url).send().await?;
        if !res.status().is_success() {
            anyhow::bail!("weather service returned {}", res.status());
        }
        Ok(res.text().await?.trim().to_string())
    }

    /// Fetch once and store the result. Any failure stores an empty string.
    pub async fn refresh(&self) -> String {
        let weather = match self.fetch().await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "weather lookup failed");
                String::new()
            }
        };
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = weather.clone();
        weather
    }

    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weather = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                weather.refresh().await;
            }
        })
    }
}

impl WeatherSource for WttrWeather {
    fn current(&self) -> String {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
