use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use log::info;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::ForecastConfig,
    error::LoadError,
    model::{Coordinates, DailySeries, HourlySeries, Metadata, RawWeatherPayload, Units},
    source::{SourceId, WeatherSource, lenient_f64, truncate_body},
    window::WindowPolicy,
};

const HOURLY_FIELDS: &str = "temperature_2m,rain,wind_speed_10m,cloud_cover,wind_gusts_10m,snowfall";
const DAILY_FIELDS: &str = "sunrise,sunset";

/// Open-Meteo hourly forecast for one coordinate pair.
#[derive(Debug, Clone)]
pub struct ForecastSource {
    base_url: String,
    coordinates: Coordinates,
    timezone: String,
    forecast_days: u8,
    models: String,
    http: Client,
}

impl ForecastSource {
    pub fn from_config(cfg: &ForecastConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            coordinates: cfg.coordinates(),
            timezone: cfg.timezone.clone(),
            forecast_days: cfg.forecast_days,
            models: cfg.models.clone(),
            http: Client::new(),
        }
    }

    /// Same query, another place.
    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn url(&self) -> String {
        format!("{}/v1/forecast", self.base_url)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.coordinates.latitude.to_string()),
            ("longitude", self.coordinates.longitude.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", self.timezone.clone()),
            ("forecast_days", self.forecast_days.to_string()),
            ("models", self.models.clone()),
            ("timeformat", "unixtime".to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    elevation: Option<f64>,
    #[serde(default)]
    utc_offset_seconds: i32,
    timezone: Option<String>,
    hourly_units: Option<HashMap<String, String>>,
    hourly: Option<OmHourly>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Option<Vec<i64>>,
    temperature_2m: Option<Vec<Option<f64>>>,
    rain: Option<Vec<Option<f64>>>,
    wind_speed_10m: Option<Vec<Option<f64>>>,
    wind_gusts_10m: Option<Vec<Option<f64>>>,
    cloud_cover: Option<Vec<Option<f64>>>,
    snowfall: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<i64>,
    #[serde(default)]
    sunrise: Vec<i64>,
    #[serde(default)]
    sunset: Vec<i64>,
}

/// Parses an Open-Meteo forecast body requested with `timeformat=unixtime`.
///
/// Times are exact instants, expressed as wall-clock readings at the
/// response's `utc_offset_seconds`. A body without `hourly` is malformed.
pub fn parse_forecast(body: &str) -> Result<RawWeatherPayload, LoadError> {
    let parsed: OmResponse = serde_json::from_str(body)
        .map_err(|e| LoadError::MalformedPayload(format!("invalid forecast JSON ({e})")))?;

    let hourly = parsed.hourly.ok_or_else(|| {
        LoadError::MalformedPayload("forecast response has no 'hourly' section".into())
    })?;

    let offset = FixedOffset::east_opt(parsed.utc_offset_seconds).ok_or_else(|| {
        LoadError::MalformedPayload(format!(
            "invalid utc_offset_seconds {}",
            parsed.utc_offset_seconds
        ))
    })?;

    let units = parsed.hourly_units.map(|u| Units {
        temperature: u.get("temperature_2m").cloned(),
        wind_speed: u.get("wind_speed_10m").cloned(),
        precipitation: u.get("rain").cloned(),
    });

    let daily = parsed.daily.map(|d| parse_daily(d, offset)).transpose()?;

    Ok(RawWeatherPayload {
        metadata: Some(Metadata {
            latitude: parsed.latitude,
            longitude: parsed.longitude,
            elevation: parsed.elevation,
            utc_offset_seconds: parsed.utc_offset_seconds,
            timezone: parsed.timezone,
        }),
        units,
        hourly: Some(HourlySeries {
            time: hourly.time.map(|t| wall_clock(&t, offset)).transpose()?,
            temperature: hourly.temperature_2m,
            precipitation: hourly.rain,
            wind_speed: hourly.wind_speed_10m,
            wind_gust: hourly.wind_gusts_10m,
            cloud_cover: hourly.cloud_cover,
            snowfall: hourly.snowfall,
        }),
        daily,
    })
}

fn instant(secs: i64) -> Result<DateTime<Utc>, LoadError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| LoadError::MalformedPayload(format!("invalid unix time {secs}")))
}

fn wall_clock(secs: &[i64], offset: FixedOffset) -> Result<Vec<NaiveDateTime>, LoadError> {
    secs.iter()
        .map(|&s| instant(s).map(|dt| dt.with_timezone(&offset).naive_local()))
        .collect()
}

fn parse_daily(daily: OmDaily, offset: FixedOffset) -> Result<DailySeries, LoadError> {
    // Days are stamped at local midnight; noon keeps the date stable when the
    // day's own offset differs from `offset`.
    let time = daily
        .time
        .iter()
        .map(|&s| {
            instant(s).map(|dt| (dt + Duration::hours(12)).with_timezone(&offset).date_naive())
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DailySeries {
        time,
        sunrise: wall_clock(&daily.sunrise, offset)?,
        sunset: wall_clock(&daily.sunset, offset)?,
    })
}

#[async_trait]
impl WeatherSource for ForecastSource {
    fn id(&self) -> SourceId {
        SourceId::Forecast
    }

    fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::TodayTomorrow
    }

    async fn load(&self) -> Result<RawWeatherPayload, LoadError> {
        let url = self.url();
        info!(
            "Fetching forecast for {},{} from {url}",
            self.coordinates.latitude, self.coordinates.longitude
        );

        let res = self
            .http
            .get(&url)
            .query(&self.query())
            .send()
            .await
            .map_err(|e| LoadError::Request(url.clone(), e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| LoadError::Request(url.clone(), e))?;

        if !status.is_success() {
            return Err(LoadError::MalformedPayload(format!(
                "forecast request failed with status {status}: {}",
                truncate_body(&body)
            )));
        }

        parse_forecast(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Timelike};

    const RESPONSE: &str = r#"{
        "latitude": 47.22,
        "longitude": -1.56,
        "generationtime_ms": 0.1,
        "utc_offset_seconds": 7200,
        "timezone": "Europe/Paris",
        "timezone_abbreviation": "CEST",
        "elevation": 21.0,
        "hourly_units": {
            "time": "iso8601",
            "temperature_2m": "°C",
            "rain": "mm",
            "wind_speed_10m": "km/h",
            "cloud_cover": "%",
            "wind_gusts_10m": "km/h",
            "snowfall": "cm"
        },
        "hourly": {
            "time": [1717192800, 1717196400],
            "temperature_2m": [15.3, 14.9],
            "rain": [0.0, 0.1],
            "wind_speed_10m": [9.4, 8.7],
            "cloud_cover": [12, null],
            "wind_gusts_10m": [20.2, 18.0],
            "snowfall": [0.0, 0.0]
        },
        "daily": {
            "time": [1717192800],
            "sunrise": [1717215120],
            "sunset": [1717271880]
        }
    }"#;

    #[test]
    fn parses_hourly_and_daily() {
        let payload = parse_forecast(RESPONSE).unwrap();

        let metadata = payload.metadata.unwrap();
        assert_eq!(metadata.utc_offset_seconds, 7200);
        assert_eq!(metadata.elevation, Some(21.0));

        let units = payload.units.unwrap();
        assert_eq!(units.wind_speed.as_deref(), Some("km/h"));
        assert_eq!(units.temperature.as_deref(), Some("°C"));

        let hourly = payload.hourly.unwrap();
        let hours: Vec<_> = hourly.time.as_ref().unwrap().iter().map(|t| t.hour()).collect();
        assert_eq!(hours, vec![0, 1]);
        assert_eq!(hourly.cloud_cover, Some(vec![Some(12.0), None]));
        assert_eq!(hourly.precipitation, Some(vec![Some(0.0), Some(0.1)]));

        let daily = payload.daily.unwrap();
        assert_eq!(daily.time, vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()]);
        assert_eq!(daily.sunset[0].format("%H:%M").to_string(), "21:58");
    }

    #[test]
    fn instants_survive_a_dst_change() {
        // Requested on 2026-10-25 after clocks went back (+01:00); the first
        // day still started at +02:00.
        let body = r#"{
            "latitude": 48.85, "longitude": 2.35, "utc_offset_seconds": 3600,
            "hourly_units": {"temperature_2m": "°C", "wind_speed_10m": "km/h"},
            "hourly": {"time": [1792879200, 1792893600], "temperature_2m": [9.0, 8.5]},
            "daily": {"time": [1792879200], "sunrise": [1792910000], "sunset": [1792947000]}
        }"#;

        let records = crate::prepare(parse_forecast(body).unwrap()).unwrap();

        let utc: Vec<_> = records.iter().map(|r| r.timestamp.with_timezone(&Utc)).collect();
        assert_eq!(utc[0], Utc.with_ymd_and_hms(2026, 10, 24, 22, 0, 0).unwrap());
        assert_eq!(utc[1], Utc.with_ymd_and_hms(2026, 10, 25, 2, 0, 0).unwrap());

        let daily = parse_forecast(body).unwrap().daily.unwrap();
        assert_eq!(daily.time, vec![NaiveDate::from_ymd_opt(2026, 10, 25).unwrap()]);
    }

    #[test]
    fn missing_hourly_is_malformed() {
        let err = parse_forecast(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap_err();
        assert!(matches!(err, LoadError::MalformedPayload(msg) if msg.contains("'hourly'")));
    }

    #[test]
    fn error_body_is_malformed() {
        let err = parse_forecast(r#"{"error": true, "reason": "Latitude must be in range"}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn error_status_is_malformed_with_reason() {
        let base = crate::source::fixture::serve(
            "400 Bad Request",
            r#"{"error": true, "reason": "Latitude must be in range of -90 to 90°"}"#,
        )
        .await;
        let source = ForecastSource::from_config(&ForecastConfig {
            base_url: base,
            ..Default::default()
        });

        let err = source.load().await.unwrap_err();
        assert!(
            matches!(err, LoadError::MalformedPayload(msg) if msg.contains("400") && msg.contains("Latitude must be"))
        );
    }

    #[tokio::test]
    async fn loads_from_server() {
        let base = crate::source::fixture::serve("200 OK", RESPONSE).await;
        let source = ForecastSource::from_config(&ForecastConfig {
            base_url: base,
            ..Default::default()
        });

        let payload = source.load().await.unwrap();
        assert_eq!(payload.metadata.unwrap().utc_offset_seconds, 7200);
    }

    #[test]
    fn query_carries_fixed_parameters() {
        let source = ForecastSource::from_config(&ForecastConfig::default()).with_coordinates(
            Coordinates {
                latitude: 45.75,
                longitude: 4.85,
            },
        );

        let query: HashMap<_, _> = source.query().into_iter().collect();
        assert_eq!(query["latitude"], "45.75");
        assert_eq!(query["longitude"], "4.85");
        assert_eq!(query["hourly"], HOURLY_FIELDS);
        assert_eq!(query["daily"], "sunrise,sunset");
        assert_eq!(query["timezone"], "Europe/Paris");
        assert_eq!(query["forecast_days"], "3");
        assert_eq!(query["models"], "meteofrance_seamless");
        assert_eq!(query["timeformat"], "unixtime");
        assert_eq!(source.url(), "https://api.open-meteo.com/v1/forecast");
    }
}
