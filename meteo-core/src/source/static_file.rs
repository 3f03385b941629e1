use async_trait::async_trait;
use chrono::FixedOffset;
use log::info;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::LoadError,
    model::{HourlySeries, Metadata, RawWeatherPayload, Units},
    source::{SourceId, WeatherSource, lenient_f64, lenient_string, parse_timestamps, read_location},
};

/// A JSON document with `metadata`, `units` and `data_1h` sections, served
/// from a fixed location.
#[derive(Debug, Clone)]
pub struct StaticFileSource {
    location: String,
    http: Client,
}

impl StaticFileSource {
    pub fn new(location: String) -> Self {
        Self {
            location,
            http: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    metadata: Option<DocMetadata>,
    units: Option<DocUnits>,
    data_1h: Option<DocHourly>,
}

#[derive(Debug, Deserialize)]
struct DocMetadata {
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    height: Option<f64>,
    /// Hours.
    #[serde(default, deserialize_with = "lenient_f64")]
    utc_timeoffset: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    timezone_abbrevation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocUnits {
    #[serde(default, deserialize_with = "lenient_string")]
    temperature: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    windspeed: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    precipitation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocHourly {
    time: Option<Vec<String>>,
    temperature: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    windspeed: Option<Vec<Option<f64>>>,
}

/// Parses the document body. Missing sections are kept as `None` for the
/// validator; only a body that is not the expected JSON shape fails here.
pub fn parse_document(body: &str) -> Result<RawWeatherPayload, LoadError> {
    let doc: Document = serde_json::from_str(body).map_err(|e| {
        LoadError::MalformedPayload(format!("the file is not a valid weather JSON document ({e})"))
    })?;

    let declared = doc
        .metadata
        .as_ref()
        .and_then(|m| m.utc_timeoffset)
        .and_then(|hours| FixedOffset::east_opt((hours * 3600.0).round() as i32));

    let (hourly, offset) = match doc.data_1h {
        Some(h) => {
            let (time, offset) = match h.time {
                Some(texts) => {
                    let (time, offset) = parse_timestamps(texts, declared)?;
                    (Some(time), Some(offset))
                }
                None => (None, declared),
            };
            let hourly = HourlySeries {
                time,
                temperature: h.temperature,
                precipitation: h.precipitation,
                wind_speed: h.windspeed,
                ..Default::default()
            };
            (Some(hourly), offset)
        }
        None => (None, declared),
    };

    let metadata = doc.metadata.map(|m| Metadata {
        latitude: m.latitude,
        longitude: m.longitude,
        elevation: m.height,
        utc_offset_seconds: offset.map_or(0, |o| o.local_minus_utc()),
        timezone: m.timezone_abbrevation,
    });

    let units = doc.units.map(|u| Units {
        temperature: u.temperature,
        wind_speed: u.windspeed,
        precipitation: u.precipitation,
    });

    Ok(RawWeatherPayload {
        metadata,
        units,
        hourly,
        daily: None,
    })
}

#[async_trait]
impl WeatherSource for StaticFileSource {
    fn id(&self) -> SourceId {
        SourceId::StaticFile
    }

    async fn load(&self) -> Result<RawWeatherPayload, LoadError> {
        let body = read_location(&self.http, &self.location, "application/json").await?;
        let payload = parse_document(&body)?;

        info!(
            "Loaded {} hourly entries from {}",
            payload
                .hourly
                .as_ref()
                .and_then(|h| h.time.as_ref())
                .map_or(0, Vec::len),
            self.location
        );
        Ok(payload)
    }
}
