use std::sync::Arc;

use terrarium_engine::devices::{DeviceRegistry, WeatherSettings};
use terrarium_engine::environment::PassiveEnvironment;
use terrarium_engine::weather::HttpWeatherSource;
use terrarium_engine::{
    BroadcastHub, EngineLoop, EngineSettings, MemoryConfigStore, MemoryHistoryStore,
    TerrariumEngine,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting terrarium engine");
    let settings = EngineSettings::from_env();

    // Hardware drivers register here; only the weather feed is built in
    let mut devices = DeviceRegistry::new();
    if let Some(url) = &settings.weather_url {
        let weather = HttpWeatherSource::new(
            url.clone(),
            WeatherSettings {
                location: std::env::var("TERRARIUM_WEATHER_LOCATION").unwrap_or_default(),
                windspeed: "ms".to_string(),
                temperature: "C".to_string(),
            },
        );
        devices = devices.with_weather(Arc::new(weather));
    }

    let environment = Arc::new(PassiveEnvironment::new(devices.sensors.values().cloned()));
    let hub = Arc::new(BroadcastHub::new());
    let engine = Arc::new(TerrariumEngine::new(
        settings,
        devices,
        Arc::new(MemoryHistoryStore::new()),
        hub.clone(),
        environment,
        Arc::new(MemoryConfigStore::new()),
    ));

    // Console dashboard: every push message at debug level
    let mut console = hub.subscribe_channel(64);
    tokio::spawn(async move {
        while let Some(message) = console.recv().await {
            debug!(kind = ?message.kind, data = %message.data, "Push message");
        }
    });

    EngineLoop::new(engine).spawn().await?;
    Ok(())
}
