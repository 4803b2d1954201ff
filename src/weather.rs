use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::devices::{WeatherData, WeatherSettings, WeatherSource};
use crate::error::DeviceError;

/// Pulls a JSON forecast from an HTTP endpoint.
///
/// The endpoint answers `GET <url>?location=<location>` with a [`WeatherData`]
/// document.
pub struct HttpWeatherSource {
    endpoint_url: String,
    client: reqwest::Client,
    settings: RwLock<WeatherSettings>,
    data: RwLock<WeatherData>,
}

impl HttpWeatherSource {
    pub fn new(endpoint_url: impl Into<String>, settings: WeatherSettings) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            client: reqwest::Client::new(),
            settings: RwLock::new(settings),
            data: RwLock::new(WeatherData::default()),
        }
    }

    async fn fetch(&self) -> Result<WeatherData, DeviceError> {
        if self.endpoint_url.is_empty() {
            return Err(DeviceError::Read {
                device: "weather".to_string(),
                reason: "no weather endpoint".to_string(),
            });
        }
        let location = self.settings.read().location.clone();
        let data = self
            .client
            .get(&self.endpoint_url)
            .query(&[("location", location.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<WeatherData>()
            .await?;
        Ok(data)
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherSource {
    async fn update(&self) -> Result<(), DeviceError> {
        let data = self.fetch().await?;
        debug!(
            location = %data.location,
            hours = data.hour_forecast.len(),
            "Weather forecast refreshed"
        );
        *self.data.write() = data;
        Ok(())
    }

    fn data(&self) -> WeatherData {
        self.data.read().clone()
    }

    fn settings(&self) -> WeatherSettings {
        self.settings.read().clone()
    }

    fn apply_settings(&self, settings: &WeatherSettings) -> Result<(), DeviceError> {
        *self.settings.write() = settings.clone();
        Ok(())
    }
}
