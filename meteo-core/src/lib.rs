//! Core library for the `meteo` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - Weather sources (static JSON, Open-Meteo forecast, CSV export)
//! - Validation and normalization of raw payloads into records
//! - Date-window filtering, derived presentation fields, city search
//!
//! It is used by `meteo-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod derive;
pub mod error;
pub mod geocode;
pub mod model;
pub mod normalize;
pub mod session;
pub mod source;
pub mod validate;
pub mod window;

pub use config::{Config, CsvConfig, ForecastConfig, GeocodingConfig, StaticFileConfig};
pub use derive::{DerivedFields, Icon};
pub use error::{LoadError, LocateError, MeteoError, ValidationError};
pub use geocode::Geocoder;
pub use model::{Coordinates, DailyAstroEntry, Place, RawWeatherPayload, WeatherRecord};
pub use session::{Commit, LoadTicket, Session};
pub use source::{SourceId, WeatherSource};
pub use window::{DateWindow, Span, WindowPolicy};

/// Validates and normalizes a payload in one step.
pub fn prepare(payload: RawWeatherPayload) -> Result<Vec<WeatherRecord>, MeteoError> {
    let payload = validate::validate(payload)?;
    Ok(normalize::normalize(&payload))
}
