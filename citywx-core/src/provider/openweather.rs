use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::QueryError,
    model::{Condition, Coordinates, WeatherReport},
};

use super::WeatherService;

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http: Client::new(),
        }
    }

    /// Point the provider at a different current-weather URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch_current(
        &self,
        location: &[(&str, String)],
        city: Option<&str>,
    ) -> Result<WeatherReport, QueryError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(location)
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to send request to OpenWeather");
                QueryError::from(e)
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to read OpenWeather response body");
            QueryError::from(e)
        })?;

        if !status.is_success() {
            tracing::info!(
                status = status.as_u16(),
                body = %truncate_body(&body),
                "OpenWeather request failed"
            );
            return Err(QueryError::from_status(status.as_u16(), city));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, body = %truncate_body(&body), "failed to parse OpenWeather JSON");
            QueryError::Unexpected(format!("invalid response body: {e}"))
        })?;

        parsed.into_report()
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    id: i64,
    name: String,
    coord: OwCoord,
    dt: i64,
    #[serde(default)]
    timezone: i32,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    visibility: Option<u32>,
    #[serde(default)]
    sys: OwSys,
}

impl OwCurrentResponse {
    fn into_report(self) -> Result<WeatherReport, QueryError> {
        if self.weather.is_empty() {
            return Err(QueryError::Unexpected(
                "OpenWeather response contained no conditions".to_string(),
            ));
        }

        let conditions = self
            .weather
            .into_iter()
            .map(|w| Condition {
                id: w.id,
                main: w.main,
                description: w.description,
                icon: w.icon,
            })
            .collect();

        Ok(WeatherReport {
            id: self.id,
            name: self.name,
            country: self.sys.country.unwrap_or_default(),
            coordinates: Coordinates::new(self.coord.lat, self.coord.lon),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            pressure: self.main.pressure.round() as u32,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg.map(|d| (d.round() as u16) % 360),
            visibility: self.visibility,
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            timezone_offset: self.timezone,
            observed_at: self.dt,
            conditions,
        })
    }
}

#[async_trait]
impl WeatherService for OpenWeatherProvider {
    async fn query_by_name(&self, name: &str) -> Result<WeatherReport, QueryError> {
        tracing::debug!(city = name, "querying OpenWeather by name");
        self.fetch_current(&[("q", name.to_string())], Some(name))
            .await
    }

    async fn query_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherReport, QueryError> {
        tracing::debug!(%coordinates, "querying OpenWeather by coordinates");
        self.fetch_current(
            &[
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
            ],
            None,
        )
        .await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
