use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Source-shaped payload: parallel arrays indexed by position.
///
/// Sections are optional so the validator can report what is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWeatherPayload {
    pub metadata: Option<Metadata>,
    pub units: Option<Units>,
    pub hourly: Option<HourlySeries>,
    pub daily: Option<DailySeries>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// `None` when the source value was absent or not a number.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub utc_offset_seconds: i32,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Units {
    pub temperature: Option<String>,
    pub wind_speed: Option<String>,
    pub precipitation: Option<String>,
}

/// Hourly-resolution arrays. Timestamps are local wall-clock times in the
/// payload's UTC offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub time: Option<Vec<NaiveDateTime>>,
    pub temperature: Option<Vec<Option<f64>>>,
    pub precipitation: Option<Vec<Option<f64>>>,
    pub wind_speed: Option<Vec<Option<f64>>>,
    pub wind_gust: Option<Vec<Option<f64>>>,
    pub cloud_cover: Option<Vec<Option<f64>>>,
    pub snowfall: Option<Vec<Option<f64>>>,
}

impl HourlySeries {
    /// Present value arrays with their field names, in a stable order.
    pub fn value_arrays(&self) -> impl Iterator<Item = (&'static str, &Vec<Option<f64>>)> {
        [
            ("temperature", &self.temperature),
            ("precipitation", &self.precipitation),
            ("wind_speed", &self.wind_speed),
            ("wind_gust", &self.wind_gust),
            ("cloud_cover", &self.cloud_cover),
            ("snowfall", &self.snowfall),
        ]
        .into_iter()
        .filter_map(|(name, values)| values.as_ref().map(|v| (name, v)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    pub time: Vec<NaiveDate>,
    pub sunrise: Vec<NaiveDateTime>,
    pub sunset: Vec<NaiveDateTime>,
}

/// Sunrise and sunset for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAstroEntry {
    pub day: NaiveDate,
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}

/// One normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub timestamp: DateTime<FixedOffset>,
    /// °C
    pub temperature: Option<f64>,
    /// mm
    pub precipitation: Option<f64>,
    /// km/h
    pub wind_speed: Option<f64>,
    /// km/h
    pub wind_gust: Option<f64>,
    /// %
    pub cloud_cover: Option<u8>,
    /// cm
    pub snowfall: Option<f64>,
    /// The payload's whole daily table, shared by every record.
    #[serde(skip)]
    pub astro: Option<Arc<[DailyAstroEntry]>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub coordinates: Coordinates,
    pub elevation: Option<f64>,
}
