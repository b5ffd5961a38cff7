//! Current-position acquisition.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    config::{LocationConfig, LocationMode},
    error::LocationError,
    model::Coordinates,
};

pub const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json/";

/// Upper bound on how long a position request may take.
pub const POSITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Options passed along with a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: POSITION_TIMEOUT,
            high_accuracy: false,
        }
    }
}

#[async_trait]
pub trait LocationSource: Send + Sync + std::fmt::Debug {
    /// Whether this source can produce a position at all.
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError>;
}

/// Build the location source selected in config.
pub fn source_from_config(config: &LocationConfig) -> Box<dyn LocationSource> {
    match config.mode {
        LocationMode::Ip => {
            let url = config
                .lookup_url
                .clone()
                .unwrap_or_else(|| DEFAULT_LOOKUP_URL.to_string());
            Box::new(IpLocation::new(url))
        }
        LocationMode::Fixed => match config.fixed_coordinates() {
            Some(coordinates) => Box::new(FixedLocation(coordinates)),
            None => {
                tracing::warn!("location mode is \"fixed\" but no coordinates are configured");
                Box::new(UnsetFixedLocation)
            }
        },
        LocationMode::Disabled => Box::new(NoLocation),
    }
}

/// Approximate position from the machine's public IP address.
#[derive(Debug, Clone)]
pub struct IpLocation {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl LocationSource for IpLocation {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        if options.high_accuracy {
            tracing::debug!("high accuracy requested; IP lookup is always coarse");
        }

        let res = self
            .http
            .get(&self.url)
            .query(&[("fields", "status,message,lat,lon")])
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "IP location lookup failed");
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Unavailable
                }
            })?;

        match res.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(LocationError::PermissionDenied);
            }
            status if !status.is_success() => {
                tracing::warn!(status = status.as_u16(), "IP location lookup rejected");
                return Err(LocationError::Unavailable);
            }
            _ => {}
        }

        let body: IpLookupResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Other(e.to_string())
            }
        })?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => {
                tracing::info!(
                    reason = body.message.as_deref().unwrap_or("none"),
                    "IP location lookup failed"
                );
                Err(LocationError::Unavailable)
            }
        }
    }
}

/// Always reports the same coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Fixed mode without coordinates: the position is never available.
#[derive(Debug, Clone, Copy)]
pub struct UnsetFixedLocation;

#[async_trait]
impl LocationSource for UnsetFixedLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// No location support on this system.
#[derive(Debug, Clone, Copy)]
pub struct NoLocation;

#[async_trait]
impl LocationSource for NoLocation {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}
