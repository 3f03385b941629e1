use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Text};
use log::debug;
use meteo_core::{
    Commit, Config, CsvConfig, DateWindow, Geocoder, MeteoError, Session, SourceId,
    StaticFileConfig, WeatherSource,
    source::{forecast::ForecastSource, source_from_config},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "meteo", version, about = "Weather charts in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure a data source: "static", "forecast" or "csv".
    Configure {
        source: String,
    },

    /// Load, filter and display weather records.
    Show {
        /// Source to use instead of the configured default.
        #[arg(long)]
        source: Option<String>,

        /// Window start, `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`.
        #[arg(long)]
        from: Option<String>,

        /// Window end (inclusive); a bare date means the end of that day.
        #[arg(long)]
        to: Option<String>,

        /// Show the forecast for this city instead of the configured place.
        #[arg(long)]
        city: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Look up a city's coordinates and elevation.
    Search {
        name: String,

        /// Store the result as the forecast location.
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { source } => configure(&source),
            Command::Show {
                source,
                from,
                to,
                city,
                json,
            } => show(source, from, to, city, json).await,
            Command::Search { name, save } => search(&name, save).await,
        }
    }
}

fn configure(source: &str) -> anyhow::Result<()> {
    let id = SourceId::try_from(source)?;
    let mut config = Config::load()?;

    match id {
        SourceId::StaticFile => {
            let location = Text::new("JSON document path or URL:")
                .with_default("public/basic-1h_basic-day.json")
                .prompt()?;
            config.static_file = Some(StaticFileConfig { location });
        }
        SourceId::Forecast => {
            let forecast = &mut config.forecast;
            forecast.latitude = CustomType::<f64>::new("Latitude:")
                .with_default(forecast.latitude)
                .prompt()?;
            forecast.longitude = CustomType::<f64>::new("Longitude:")
                .with_default(forecast.longitude)
                .prompt()?;
            forecast.timezone = Text::new("Timezone:")
                .with_default(&forecast.timezone)
                .prompt()?;
            forecast.forecast_days = CustomType::<u8>::new("Forecast days:")
                .with_default(forecast.forecast_days)
                .prompt()?;
            forecast.place = None;
            forecast.elevation = None;
        }
        SourceId::Csv => {
            let location = Text::new("CSV export path or URL:").prompt()?;
            let strict = Confirm::new("Fail on unparseable numbers instead of reading them as 0?")
                .with_default(false)
                .prompt()?;
            config.csv = Some(CsvConfig { location, strict });
        }
    }

    config.adopt_default_source(id);
    config.save()?;
    println!(
        "Saved {id} configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn show(
    source: Option<String>,
    from: Option<String>,
    to: Option<String>,
    city: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;

    let mut place = None;
    let source: Box<dyn WeatherSource> = match city {
        Some(city) => {
            let geocoder = Geocoder::from_config(&config.geocoding);
            let found = geocoder.locate(&city).await.map_err(report)?;
            let forecast =
                ForecastSource::from_config(&config.forecast).with_coordinates(found.coordinates);
            place = Some(found);
            Box::new(forecast)
        }
        None => {
            let id = match source {
                Some(s) => SourceId::try_from(s.as_str())?,
                None => config.default_source_id()?,
            };
            source_from_config(id, &config)?
        }
    };

    let mut session = Session::new(source.window_policy());
    if let Some(place) = place {
        session.apply_place(place);
    }

    let ticket = session.begin_load();
    let result = source.load().await;
    if session.commit_load(ticket, result, Utc::now()) != Commit::Applied {
        let diagnostic = session.error().unwrap_or("Unknown error");
        eprintln!("{diagnostic}");
        bail!("Could not load weather data from the {} source", source.id());
    }

    if from.is_some() || to.is_some() {
        let offset = session
            .offset()
            .ok_or_else(|| anyhow!("The data set is empty, nothing to filter"))?;
        let current = session.window();
        let window = DateWindow::new(
            from.map(|s| parse_bound(&s, false, offset)).transpose()?.or(current.start),
            to.map(|s| parse_bound(&s, true, offset)).transpose()?.or(current.end),
        );
        debug!("Window from flags: {window:?}");
        session.set_window(window);
    }

    let place_name = session
        .place()
        .map(|p| p.name.clone())
        .or_else(|| config.forecast.place.clone().filter(|_| source.id() == SourceId::Forecast));

    if json {
        println!("{}", render::json(session.filtered())?);
    } else {
        print!(
            "{}",
            render::table(session.filtered(), session.payload(), place_name.as_deref())
        );
    }
    Ok(())
}

async fn search(name: &str, save: bool) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    let geocoder = Geocoder::from_config(&config.geocoding);

    let place = geocoder.locate(name).await.map_err(report)?;

    println!("{}", place.name);
    println!(
        "  {:.4}, {:.4}",
        place.coordinates.latitude, place.coordinates.longitude
    );
    if let Some(elevation) = place.elevation {
        println!("  {elevation:.0} m");
    }

    if save {
        config.forecast.set_place(&place);
        config.save()?;
        println!("Saved as the forecast location.");
    }
    Ok(())
}

/// Prints the diagnostic and turns the error into a short CLI failure.
fn report(err: impl Into<MeteoError>) -> anyhow::Error {
    let err = err.into();
    eprintln!("{}", err.diagnostic());
    anyhow!("{err}")
}

/// Parses a window bound given on the command line, in the data's offset.
fn parse_bound(
    text: &str,
    end_of_day: bool,
    offset: FixedOffset,
) -> anyhow::Result<DateTime<FixedOffset>> {
    let text = text.trim();
    let naive = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            if end_of_day {
                date.and_hms_opt(23, 59, 59)
            } else {
                date.and_hms_opt(0, 0, 0)
            }
        })
        .ok_or_else(|| anyhow!("Invalid date '{text}'. Use YYYY-MM-DD or YYYY-MM-DDTHH:MM."))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Date '{text}' does not exist in offset {offset}"))
}
