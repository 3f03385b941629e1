use crate::{
    Config,
    error::LoadError,
    model::RawWeatherPayload,
    source::{csv::CsvSource, forecast::ForecastSource, static_file::StaticFileSource},
    window::WindowPolicy,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use log::info;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Deserializer};
use std::{convert::TryFrom, fmt::Debug, io::ErrorKind};

pub mod csv;
pub mod forecast;
pub mod static_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    StaticFile,
    Forecast,
    Csv,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::StaticFile => "static",
            SourceId::Forecast => "forecast",
            SourceId::Csv => "csv",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[SourceId::StaticFile, SourceId::Forecast, SourceId::Csv]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SourceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "static" | "static-file" | "json" => Ok(SourceId::StaticFile),
            "forecast" | "open-meteo" => Ok(SourceId::Forecast),
            "csv" => Ok(SourceId::Csv),
            _ => Err(anyhow::anyhow!(
                "Unknown source '{value}'. Supported sources: static, forecast, csv."
            )),
        }
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    fn id(&self) -> SourceId;

    /// Window chosen after the first successful load.
    fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::FullSpan
    }

    /// Issues a single fetch and parses the body. No retries.
    async fn load(&self) -> Result<RawWeatherPayload, LoadError>;
}

/// Construct a source from config and explicit SourceId.
pub fn source_from_config(id: SourceId, config: &Config) -> anyhow::Result<Box<dyn WeatherSource>> {
    let missing = || {
        anyhow::anyhow!(
            "No location configured for source '{id}'.\n\
             Hint: run `meteo configure {id}` and enter the data location."
        )
    };

    let boxed: Box<dyn WeatherSource> = match id {
        SourceId::StaticFile => {
            let cfg = config.static_file.as_ref().ok_or_else(missing)?;
            Box::new(StaticFileSource::new(cfg.location.clone()))
        }
        SourceId::Forecast => Box::new(ForecastSource::from_config(&config.forecast)),
        SourceId::Csv => {
            let cfg = config.csv.as_ref().ok_or_else(missing)?;
            Box::new(CsvSource::new(cfg.location.clone(), cfg.strict))
        }
    };

    Ok(boxed)
}

/// Construct the default source from config, using `default_source` field.
pub fn default_source_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherSource>> {
    let id = config.default_source_id()?;
    source_from_config(id, config)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads a static resource from a URL or the local filesystem.
///
/// 404 and missing files map to `NotFound`, other HTTP failures to `Http`.
pub(crate) async fn read_location(
    http: &Client,
    location: &str,
    accept: &str,
) -> Result<String, LoadError> {
    if !is_remote(location) {
        info!("Reading {location}");
        return tokio::fs::read_to_string(location).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                LoadError::NotFound(location.to_string())
            } else {
                LoadError::Io(location.into(), e)
            }
        });
    }

    info!("Fetching {location}");
    let res = http
        .get(location)
        .header(header::ACCEPT, accept)
        .header(header::CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| LoadError::Request(location.to_string(), e))?;

    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        return Err(LoadError::NotFound(location.to_string()));
    }
    if !status.is_success() {
        return Err(LoadError::Http(status));
    }

    res.text()
        .await
        .map_err(|e| LoadError::Request(location.to_string(), e))
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// A source timestamp: a wall-clock reading, or an exact instant when the
/// text carries its own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stamp {
    Local(NaiveDateTime),
    Instant(DateTime<FixedOffset>),
}

impl Stamp {
    fn offset(&self) -> Option<FixedOffset> {
        match self {
            Stamp::Local(_) => None,
            Stamp::Instant(dt) => Some(*dt.offset()),
        }
    }

    /// Wall-clock reading at `offset`. Instants are converted, local
    /// readings are taken as already being at `offset`.
    pub(crate) fn wall_clock(self, offset: FixedOffset) -> NaiveDateTime {
        match self {
            Stamp::Local(naive) => naive,
            Stamp::Instant(dt) => dt.with_timezone(&offset).naive_local(),
        }
    }
}

/// Parses the timestamp shapes used by the supported sources. A bare date
/// means midnight.
pub(crate) fn parse_timestamp(text: &str) -> Option<Stamp> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(Stamp::Local)
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(Stamp::Instant))
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Stamp::Local)
        })
}

/// Parses `texts` into wall-clock readings sharing one offset.
///
/// The offset is `declared` when the payload states one, otherwise the first
/// offset written in the timestamps themselves, otherwise UTC. Returns the
/// readings together with that offset.
pub(crate) fn parse_timestamps(
    texts: Vec<String>,
    declared: Option<FixedOffset>,
) -> Result<(Vec<NaiveDateTime>, FixedOffset), LoadError> {
    let stamps = texts
        .into_iter()
        .map(|text| {
            parse_timestamp(&text)
                .ok_or_else(|| LoadError::MalformedPayload(format!("invalid timestamp '{text}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let offset = declared
        .or_else(|| stamps.iter().find_map(Stamp::offset))
        .unwrap_or_else(|| Utc.fix());

    Ok((
        stamps.into_iter().map(|s| s.wall_clock(offset)).collect(),
        offset,
    ))
}

/// Numbers stay numbers, anything else becomes `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

/// Strings stay strings, anything else becomes `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_string)))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
