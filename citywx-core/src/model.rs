use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// One weather condition descriptor as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    /// Short category, e.g. "Rain".
    pub main: String,
    /// Human description, e.g. "light rain".
    pub description: String,
    /// Provider icon token, e.g. "10d".
    pub icon: String,
}

/// Current conditions for one city. Temperatures are in °C, wind in m/s,
/// timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_direction: Option<u16>,
    pub visibility: Option<u32>,
    pub sunrise: i64,
    pub sunset: i64,
    /// Shift in seconds from UTC for the city.
    pub timezone_offset: i32,
    pub observed_at: i64,
    pub conditions: Vec<Condition>,
}

impl WeatherReport {
    /// The leading condition, which the provider lists as the primary one.
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }

    /// When the observation was made, in the city's local time.
    pub fn observed_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.observed_at)
    }

    pub fn sunrise_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.sunrise)
    }

    pub fn sunset_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.sunset)
    }

    fn local_time(&self, ts: i64) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.timezone_offset)?;
        DateTime::<Utc>::from_timestamp(ts, 0).map(|utc| utc.with_timezone(&offset))
    }

    /// Checks the invariants a report must hold before it is trusted,
    /// used when restoring one from storage.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.conditions.is_empty()
    }
}

/// A saved city. `id` matches [`WeatherReport::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteCity {
    pub id: i64,
    pub name: String,
    pub country: String,
}

impl From<&WeatherReport> for FavoriteCity {
    fn from(report: &WeatherReport) -> Self {
        Self {
            id: report.id,
            name: report.name.clone(),
            country: report.country.clone(),
        }
    }
}
