//! Classified errors surfaced to the user.
//!
//! Every variant maps to one fixed, human-readable message through
//! `user_message()`. The `Display` impls stay technical and are meant for logs.

use thiserror::Error;

/// Failure of a weather query, classified by cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The provider does not know the city (HTTP 404). `city` is `None` for
    /// coordinate lookups.
    #[error("no weather data for {}", .city.as_deref().unwrap_or("coordinates"))]
    NotFound { city: Option<String> },

    #[error("provider rejected the API key")]
    Unauthorized,

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned status {status}")]
    Unavailable { status: u16 },

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected provider failure: {0}")]
    Unexpected(String),
}

impl QueryError {
    /// Classify a non-success HTTP status. `city` is the name that was
    /// queried, if any.
    pub fn from_status(status: u16, city: Option<&str>) -> Self {
        match status {
            404 => QueryError::NotFound {
                city: city.map(str::to_owned),
            },
            401 => QueryError::Unauthorized,
            429 => QueryError::RateLimited,
            _ => QueryError::Unavailable { status },
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            QueryError::NotFound { city: Some(city) } => {
                format!("City \"{city}\" not found. Please check the spelling and try again.")
            }
            QueryError::NotFound { city: None } => {
                "No weather data found for your location.".to_string()
            }
            QueryError::Unauthorized => {
                "Invalid API key. Please check your configuration.".to_string()
            }
            QueryError::RateLimited => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            QueryError::Unavailable { .. } => {
                "Weather service is currently unavailable. Please try again later.".to_string()
            }
            QueryError::Unreachable(_) => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
            QueryError::Unexpected(_) => "Failed to fetch weather data. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            QueryError::Unreachable(e.to_string())
        } else {
            QueryError::Unexpected(e.to_string())
        }
    }
}

/// Failure to obtain the current position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,

    #[error("location services unsupported")]
    Unsupported,

    #[error("location error: {0}")]
    Other(String),
}

impl LocationError {
    /// Map a platform position error code (1 denied, 2 unavailable,
    /// 3 timeout) onto a variant.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::Unavailable,
            3 => LocationError::Timeout,
            other => LocationError::Other(format!("code {other}")),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access was denied. Please enable location access or search for a city manually."
            }
            LocationError::Unavailable => {
                "Location information is unavailable. Please search for a city manually."
            }
            LocationError::Timeout => {
                "Location request timed out. Please try again or search for a city manually."
            }
            LocationError::Unsupported => {
                "Location services are not supported on this system. Please search for a city manually."
            }
            LocationError::Other(_) => "An unknown error occurred while retrieving your location.",
        }
    }
}

/// Failure of the durable key-value backend. Never surfaced to the user.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
