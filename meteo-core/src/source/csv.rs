use async_trait::async_trait;
use ::csv::StringRecord;
use chrono::NaiveDate;
use log::{info, warn};
use reqwest::Client;

use crate::{
    error::LoadError,
    model::{HourlySeries, Metadata, RawWeatherPayload, Units},
    source::{SourceId, WeatherSource, read_location},
};

/// Fixed column order of the export.
pub const COLUMNS: [&str; 10] = [
    "NUM_POSTE", "NOM_USUEL", "LAT", "LON", "ALTI", "AAAAMMJJ", "RR", "TM", "FFM", "FXI",
];

const LAT: usize = 2;
const LON: usize = 3;
const ALTI: usize = 4;
const DATE: usize = 5;
const RR: usize = 6;
const TM: usize = 7;
const FFM: usize = 8;
const FXI: usize = 9;

/// Semicolon-delimited daily station export.
#[derive(Debug, Clone)]
pub struct CsvSource {
    location: String,
    strict: bool,
    http: Client,
}

impl CsvSource {
    pub fn new(location: String, strict: bool) -> Self {
        Self {
            location,
            strict,
            http: Client::new(),
        }
    }
}

/// `YYYYMMDD` to `YYYY-MM-DD`.
pub fn reformat_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..]))
}

struct RowParser {
    strict: bool,
    defaulted: usize,
}

impl RowParser {
    fn number(&mut self, record: &StringRecord, column: usize, line: u64) -> Result<f64, LoadError> {
        let raw = record.get(column).unwrap_or("");
        match raw.replace(',', ".").parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) if self.strict => Err(LoadError::MalformedPayload(format!(
                "line {line}: column {} has invalid number '{raw}'",
                COLUMNS[column]
            ))),
            Err(_) => {
                self.defaulted += 1;
                Ok(0.0)
            }
        }
    }
}

/// Parses the export body.
///
/// The header record is discarded and blank lines are skipped. Fields may
/// be quoted; surrounding whitespace is trimmed. Unparseable
/// numbers read as 0 unless `strict` is set; a bad date always fails.
pub fn parse_csv(text: &str, strict: bool) -> Result<RawWeatherPayload, LoadError> {
    let mut parser = RowParser {
        strict,
        defaulted: 0,
    };
    let mut metadata = None;
    let mut hourly = HourlySeries {
        time: Some(Vec::new()),
        temperature: Some(Vec::new()),
        precipitation: Some(Vec::new()),
        wind_speed: Some(Vec::new()),
        wind_gust: Some(Vec::new()),
        ..Default::default()
    };

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(text.as_bytes());

    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| LoadError::MalformedPayload(format!("unreadable CSV ({e})")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line_no = record
            .position()
            .map_or(idx as u64 + 2, |pos| pos.line());

        let raw_date = record.get(DATE).unwrap_or("");
        let date = reformat_date(raw_date)
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| {
                LoadError::MalformedPayload(format!("line {line_no}: invalid date '{raw_date}'"))
            })?;

        if metadata.is_none() {
            metadata = Some(Metadata {
                latitude: Some(parser.number(&record, LAT, line_no)?),
                longitude: Some(parser.number(&record, LON, line_no)?),
                elevation: Some(parser.number(&record, ALTI, line_no)?),
                utc_offset_seconds: 0,
                timezone: None,
            });
        }

        push(&mut hourly.time, date);
        push(&mut hourly.precipitation, Some(parser.number(&record, RR, line_no)?));
        push(&mut hourly.temperature, Some(parser.number(&record, TM, line_no)?));
        push(&mut hourly.wind_speed, Some(parser.number(&record, FFM, line_no)?));
        push(&mut hourly.wind_gust, Some(parser.number(&record, FXI, line_no)?));
    }

    if parser.defaulted > 0 {
        warn!(
            "{} CSV field(s) could not be parsed and were read as 0",
            parser.defaulted
        );
    }

    Ok(RawWeatherPayload {
        metadata,
        units: Some(Units {
            temperature: Some("°C".into()),
            wind_speed: Some("m/s".into()),
            precipitation: Some("mm".into()),
        }),
        hourly: Some(hourly),
        daily: None,
    })
}

fn push<T>(column: &mut Option<Vec<T>>, value: T) {
    column.get_or_insert_with(Vec::new).push(value);
}

#[async_trait]
impl WeatherSource for CsvSource {
    fn id(&self) -> SourceId {
        SourceId::Csv
    }

    async fn load(&self) -> Result<RawWeatherPayload, LoadError> {
        let text = read_location(&self.http, &self.location, "text/csv").await?;
        let payload = parse_csv(&text, self.strict)?;

        info!(
            "Loaded {} CSV rows from {}",
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
