use crate::{
    Config,
    error::QueryError,
    model::{Coordinates, WeatherReport},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of current weather reports.
#[async_trait]
pub trait WeatherService: Send + Sync + Debug {
    async fn query_by_name(&self, name: &str) -> Result<WeatherReport, QueryError>;

    async fn query_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherReport, QueryError>;
}

/// Construct the weather service from config.
pub fn service_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherService>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `citywx configure` or set {}.",
            crate::config::API_KEY_ENV
        )
    })?;

    let mut provider = OpenWeatherProvider::new(api_key.to_owned());
    if let Some(endpoint) = &config.endpoint {
        provider = provider.with_endpoint(endpoint.clone());
    }

    Ok(Box::new(provider))
}

/// Stand-in used when no API key is configured. Every query fails as
/// unauthorized, so local-only operations still work.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl WeatherService for Unconfigured {
    async fn query_by_name(&self, _name: &str) -> Result<WeatherReport, QueryError> {
        Err(QueryError::Unauthorized)
    }

    async fn query_by_coordinates(
        &self,
        _coordinates: Coordinates,
    ) -> Result<WeatherReport, QueryError> {
        Err(QueryError::Unauthorized)
    }
}
