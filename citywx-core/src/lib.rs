//! Core library for the `citywx` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather query service and its OpenWeather implementation
//! - Current-position lookup
//! - Best-effort persistence of the last report and the favorites
//! - The application state controller tying it all together
//!
//! It is used by `citywx-cli`, but can also be reused by other front ends.

pub mod config;
pub mod controller;
pub mod error;
pub mod favorites;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;

pub use config::{Config, LocationConfig, LocationMode};
pub use controller::{AppState, WeatherApp};
pub use error::{LocationError, QueryError, StorageError};
pub use favorites::Favorites;
pub use location::{LocationSource, PositionOptions};
pub use model::{Condition, Coordinates, FavoriteCity, WeatherReport};
pub use provider::WeatherService;
pub use store::{FileStorage, MemoryStorage, PersistentStore, Storage};
