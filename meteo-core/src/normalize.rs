use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

use crate::model::{DailyAstroEntry, DailySeries, RawWeatherPayload, WeatherRecord};

/// Wind speed unit as reported by a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindUnit {
    MetersPerSecond,
    KilometersPerHour,
    Knots,
    MilesPerHour,
}

impl WindUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "m/s" | "ms-1" | "ms" | "mps" => Some(WindUnit::MetersPerSecond),
            "km/h" | "kmh" | "kph" => Some(WindUnit::KilometersPerHour),
            "kn" | "kt" | "knots" => Some(WindUnit::Knots),
            "mph" | "mp/h" => Some(WindUnit::MilesPerHour),
            _ => None,
        }
    }

    /// Multiplier turning a value in this unit into km/h.
    pub fn to_kmh_factor(self) -> f64 {
        match self {
            WindUnit::MetersPerSecond => 3.6,
            WindUnit::KilometersPerHour => 1.0,
            WindUnit::Knots => 1.852,
            WindUnit::MilesPerHour => 1.609_344,
        }
    }
}

/// Rounds to one decimal place, ties away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn localize(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(
        naive - chrono::Duration::seconds(i64::from(offset.local_minus_utc())),
        offset,
    )
}

/// Maps a validated payload's parallel arrays into one record per timestamp.
///
/// Input order is kept as-is. An absent wind unit is read as m/s.
pub fn normalize(payload: &RawWeatherPayload) -> Vec<WeatherRecord> {
    let Some(hourly) = payload.hourly.as_ref() else {
        return Vec::new();
    };
    let Some(times) = hourly.time.as_ref() else {
        return Vec::new();
    };

    let offset = payload
        .metadata
        .as_ref()
        .and_then(|m| FixedOffset::east_opt(m.utc_offset_seconds))
        .unwrap_or_else(|| Utc.fix());

    let wind_factor = payload
        .units
        .as_ref()
        .and_then(|u| u.wind_speed.as_deref())
        .and_then(WindUnit::parse)
        .unwrap_or(WindUnit::MetersPerSecond)
        .to_kmh_factor();

    let astro = payload
        .daily
        .as_ref()
        .map(|daily| astro_table(daily, offset));

    let at = |values: &Option<Vec<Option<f64>>>, i: usize| -> Option<f64> {
        values.as_ref().and_then(|v| v.get(i).copied().flatten())
    };

    times
        .iter()
        .enumerate()
        .map(|(i, time)| WeatherRecord {
            timestamp: localize(*time, offset),
            temperature: at(&hourly.temperature, i).map(round_one_decimal),
            precipitation: at(&hourly.precipitation, i).map(round_one_decimal),
            wind_speed: at(&hourly.wind_speed, i).map(|v| round_one_decimal(v * wind_factor)),
            wind_gust: at(&hourly.wind_gust, i).map(|v| round_one_decimal(v * wind_factor)),
            cloud_cover: at(&hourly.cloud_cover, i).map(|v| v.round().clamp(0.0, 100.0) as u8),
            snowfall: at(&hourly.snowfall, i).map(round_one_decimal),
            astro: astro.clone(),
        })
        .collect()
}

fn astro_table(daily: &DailySeries, offset: FixedOffset) -> Arc<[DailyAstroEntry]> {
    daily
        .time
        .iter()
        .zip(&daily.sunrise)
        .zip(&daily.sunset)
        .map(|((day, sunrise), sunset)| DailyAstroEntry {
            day: *day,
            sunrise: localize(*sunrise, offset),
            sunset: localize(*sunset, offset),
        })
        .collect()
}
