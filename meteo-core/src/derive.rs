//! Presentation values computed from a single record.

use chrono::Timelike;
use serde::Serialize;

use crate::model::{DailyAstroEntry, WeatherRecord};

const DAY_START_HOUR: u32 = 6;
const NIGHT_START_HOUR: u32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    Snow,
    Rain,
    ClearDay,
    ClearNight,
    PartlyCloudyDay,
    PartlyCloudyNight,
    OvercastDay,
    OvercastNight,
}

impl Icon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Icon::Snow => "snow",
            Icon::Rain => "rain",
            Icon::ClearDay => "clear-day",
            Icon::ClearNight => "clear-night",
            Icon::PartlyCloudyDay => "partly-cloudy-day",
            Icon::PartlyCloudyNight => "partly-cloudy-night",
            Icon::OvercastDay => "overcast-day",
            Icon::OvercastNight => "overcast-night",
        }
    }

    /// Short glyph for terminal output.
    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::Snow => "❄",
            Icon::Rain => "☂",
            Icon::ClearDay => "☀",
            Icon::ClearNight => "☾",
            Icon::PartlyCloudyDay => "⛅",
            Icon::PartlyCloudyNight => "☁☾",
            Icon::OvercastDay | Icon::OvercastNight => "☁",
        }
    }
}

impl std::fmt::Display for Icon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedFields {
    pub icon: Icon,
    pub is_daytime: bool,
    pub sunrise: String,
    pub sunset: String,
}

pub fn resolve(record: &WeatherRecord) -> DerivedFields {
    let (sunrise, sunset) = sun_times(record);
    DerivedFields {
        icon: select_icon(record),
        is_daytime: is_daytime(record),
        sunrise,
        sunset,
    }
}

/// Snow beats rain, rain beats cloud cover. Missing values count as zero.
pub fn select_icon(record: &WeatherRecord) -> Icon {
    if record.snowfall.unwrap_or(0.0) > 0.0 {
        return Icon::Snow;
    }
    if record.precipitation.unwrap_or(0.0) > 0.0 {
        return Icon::Rain;
    }

    let day = is_daytime(record);
    match (record.cloud_cover.unwrap_or(0), day) {
        (0..10, true) => Icon::ClearDay,
        (0..10, false) => Icon::ClearNight,
        (10..70, true) => Icon::PartlyCloudyDay,
        (10..70, false) => Icon::PartlyCloudyNight,
        (_, true) => Icon::OvercastDay,
        (_, false) => Icon::OvercastNight,
    }
}

/// Uses the day's sunrise/sunset when known, a fixed 06:00-21:00 band
/// otherwise.
pub fn is_daytime(record: &WeatherRecord) -> bool {
    match astro_for(record) {
        Some(entry) => entry.sunrise <= record.timestamp && record.timestamp < entry.sunset,
        None => (DAY_START_HOUR..NIGHT_START_HOUR).contains(&record.timestamp.hour()),
    }
}

/// First daily entry for the record's calendar day.
pub fn astro_for(record: &WeatherRecord) -> Option<&DailyAstroEntry> {
    let day = record.timestamp.date_naive();
    record.astro.as_deref()?.iter().find(|entry| entry.day == day)
}

/// Sunrise and sunset as `HH:MM`, or empty strings when the day is unknown.
pub fn sun_times(record: &WeatherRecord) -> (String, String) {
    astro_for(record)
        .map(|entry| {
            (
                entry.sunrise.format("%H:%M").to_string(),
                entry.sunset.format("%H:%M").to_string(),
            )
        })
        .unwrap_or_default()
}
