use comfy_table::{
    CellAlignment, Table,
    modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};
use meteo_core::{
    RawWeatherPayload, WeatherRecord,
    derive::{self, DerivedFields},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Row<'a> {
    #[serde(flatten)]
    record: &'a WeatherRecord,
    #[serde(flatten)]
    derived: DerivedFields,
}

pub fn json(records: &[WeatherRecord]) -> anyhow::Result<String> {
    let rows: Vec<Row<'_>> = records
        .iter()
        .map(|record| Row {
            record,
            derived: derive::resolve(record),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

const HEADER: [&str; 7] = ["Time", "", "Temp", "Rain", "Wind", "Gusts", "Clouds"];

/// A title line, then one table per calendar day headed by its date and
/// sunrise/sunset.
pub fn table(
    records: &[WeatherRecord],
    payload: Option<&RawWeatherPayload>,
    place: Option<&str>,
) -> String {
    let metadata = payload.and_then(|p| p.metadata.as_ref());
    let title = match (place, metadata) {
        (Some(name), _) => name.to_string(),
        (None, Some(m)) => format!(
            "{:.4}, {:.4}",
            m.latitude.unwrap_or_default(),
            m.longitude.unwrap_or_default()
        ),
        (None, None) => "Weather".to_string(),
    };
    let elevation = metadata
        .and_then(|m| m.elevation)
        .map(|e| format!(" ({e:.0} m)"))
        .unwrap_or_default();
    let mut out = format!("{title}{elevation}\n");

    if records.is_empty() {
        out.push_str("No records in the selected window.\n");
        return out;
    }

    for day in records.chunk_by(|a, b| a.timestamp.date_naive() == b.timestamp.date_naive()) {
        let first = &day[0];
        let (sunrise, sunset) = derive::sun_times(first);
        out.push('\n');
        out.push_str(&first.timestamp.format("%a %d %b %Y").to_string());
        if !sunrise.is_empty() {
            out.push_str(&format!("   sunrise {sunrise}   sunset {sunset}"));
        }
        out.push('\n');
        out.push_str(&day_table(day).to_string());
        out.push('\n');
    }
    out
}

fn day_table(records: &[WeatherRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(HEADER.to_vec());

    for record in records {
        table.add_row(vec![
            record.timestamp.format("%H:%M").to_string(),
            derive::select_icon(record).glyph().to_string(),
            value(record.temperature, "°C"),
            value(record.precipitation, "mm"),
            value(record.wind_speed, "km/h"),
            value(record.wind_gust, "km/h"),
            record
                .cloud_cover
                .map_or_else(|| "-".to_string(), |c| format!("{c}%")),
        ]);
    }

    for column in 2..HEADER.len() {
        if let Some(column) = table.column_mut(column) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}
