use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::{
    model::{Coordinates, Place},
    source::SourceId,
};

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_SEARCH_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-meteo.com";

/// Static JSON document, local path or `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticFileConfig {
    pub location: String,
}

/// Open-Meteo forecast query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub forecast_days: u8,
    pub models: String,
    /// Display name of the current location, set by a city search.
    pub place: Option<String>,
    pub elevation: Option<f64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        // Paris
        Self {
            base_url: DEFAULT_FORECAST_URL.to_string(),
            latitude: 48.8534,
            longitude: 2.3488,
            timezone: "Europe/Paris".to_string(),
            forecast_days: 3,
            models: "meteofrance_seamless".to_string(),
            place: None,
            elevation: None,
        }
    }
}

impl ForecastConfig {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn set_place(&mut self, place: &Place) {
        self.latitude = place.coordinates.latitude;
        self.longitude = place.coordinates.longitude;
        self.place = Some(place.name.clone());
        self.elevation = place.elevation;
    }
}

/// Semicolon-delimited daily export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvConfig {
    pub location: String,
    /// Fail on unparseable numbers instead of reading them as 0.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub search_url: String,
    pub elevation_url: String,
    /// Appended to every query, searches are restricted to this country.
    pub country: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            elevation_url: DEFAULT_ELEVATION_URL.to_string(),
            country: "france".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Optional default source id: "static", "forecast" or "csv".
    pub default_source: Option<String>,

    pub static_file: Option<StaticFileConfig>,

    /// Example TOML:
    /// [forecast]
    /// latitude = 47.218
    /// longitude = -1.553
    #[serde(default)]
    pub forecast: ForecastConfig,

    pub csv: Option<CsvConfig>,

    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

impl Config {
    /// Return the default source as a strongly-typed SourceId.
    pub fn default_source_id(&self) -> Result<SourceId> {
        let s = self.default_source.as_ref().ok_or_else(|| {
            anyhow!(
                "No default source configured.\n\
                 Hint: run `meteo configure <source>` (e.g. `meteo configure forecast`) first."
            )
        })?;

        SourceId::try_from(s.as_str())
    }

    /// Store default source as string.
    pub fn set_default_source(&mut self, id: SourceId) {
        self.default_source = Some(id.as_str().to_string());
    }

    /// Make `id` the default unless another source already is.
    pub fn adopt_default_source(&mut self, id: SourceId) {
        if self.default_source.is_none() {
            self.set_default_source(id);
        }
    }

    pub fn is_source_configured(&self, id: SourceId) -> bool {
        match id {
            SourceId::StaticFile => self.static_file.is_some(),
            SourceId::Forecast => true,
            SourceId::Csv => self.csv.is_some(),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "meteo", "meteo-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_source_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_source_id().unwrap_err();

        assert!(err.to_string().contains("No default source configured"));
    }

    #[test]
    fn adopt_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.adopt_default_source(SourceId::Csv);
        cfg.adopt_default_source(SourceId::Forecast);

        assert_eq!(cfg.default_source_id().unwrap(), SourceId::Csv);
    }

    #[test]
    fn set_default_source_overrides_default() {
        let mut cfg = Config::default();

        cfg.adopt_default_source(SourceId::Csv);
        cfg.set_default_source(SourceId::StaticFile);

        assert_eq!(cfg.default_source_id().unwrap(), SourceId::StaticFile);
    }

    #[test]
    fn forecast_is_always_configured() {
        let cfg = Config::default();
        assert!(cfg.is_source_configured(SourceId::Forecast));
        assert!(!cfg.is_source_configured(SourceId::Csv));
    }

    #[test]
    fn set_place_replaces_coordinates() {
        let mut forecast = ForecastConfig::default();
        forecast.set_place(&Place {
            name: "Nantes, Loire-Atlantique".into(),
            coordinates: Coordinates {
                latitude: 47.2186,
                longitude: -1.5541,
            },
            elevation: Some(20.0),
        });

        assert_eq!(forecast.latitude, 47.2186);
        assert_eq!(forecast.longitude, -1.5541);
        assert_eq!(forecast.place.as_deref(), Some("Nantes, Loire-Atlantique"));
        assert_eq!(forecast.elevation, Some(20.0));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_default_source(SourceId::Csv);
        cfg.csv = Some(CsvConfig {
            location: "data/export.csv".into(),
            strict: true,
        });
        cfg.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_forecast_section_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            default_source = "forecast"

            [forecast]
            latitude = 45.76
            longitude = 4.84
            "#,
        )
        .unwrap();

        assert_eq!(cfg.forecast.latitude, 45.76);
        assert_eq!(cfg.forecast.timezone, "Europe/Paris");
        assert_eq!(cfg.geocoding.country, "france");
    }
}
