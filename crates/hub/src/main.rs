//! Status board hub: WebSocket backend.
//!
//! Required env: X_API_KEY
//! Optional: HOST, PORT, KEEPALIVE_SECS, FANOUT_BUDGET_SECS, STALENESS_SECS,
//! SHIFTS_CSV_EXPORT_URL, ROSTER_REFRESH_SECS, WEATHER_URL, WEATHER_REFRESH_SECS,
//! SITE_UTC_OFFSET_HOURS

use std::net::SocketAddr;
use std::sync::Arc;

use hub::derive::{Deriver, DutyRoster, NoWeather, SheetRoster, ShiftTable, WeatherSource, WttrWeather};
use hub::{api, config, relay};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env()
        .map_err(|e| anyhow::anyhow!("config: {} (X_API_KEY is required)", e))?;
    let config = Arc::new(config);

    let roster: Arc<dyn DutyRoster> = match &config.shifts_csv_url {
        Some(url) => {
            let roster = Arc::new(SheetRoster::new(url.clone())?);
            roster.spawn_refresh(config.roster_refresh);
            roster
        }
        None => {
            tracing::warn!("SHIFTS_CSV_EXPORT_URL not set, nobody will be on duty");
            Arc::new(ShiftTable::default())
        }
    };

    let weather: Arc<dyn WeatherSource> = if config.weather_url.is_empty() {
        Arc::new(NoWeather)
    } else {
        let weather = Arc::new(WttrWeather::new(config.weather_url.clone())?);
        weather.spawn_refresh(config.weather_refresh);
        weather
    };

    let deriver = Deriver::new(roster, weather, config.site_offset());
    let hub = Arc::new(relay::Hub::new(Arc::clone(&config), deriver));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    let state = api::AppState { hub };
    let app = api::router(state);

    tracing::info!("Hub listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
