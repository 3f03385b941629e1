use log::info;
use reqwest::{Client, header};
use serde::Deserialize;

use crate::{
    config::GeocodingConfig,
    error::LocateError,
    model::{Coordinates, Place},
    source::truncate_body,
};

const USER_AGENT: &str = concat!("meteo/", env!("CARGO_PKG_VERSION"));

/// Turns a city name into coordinates and elevation.
#[derive(Debug, Clone)]
pub struct Geocoder {
    search_url: String,
    elevation_url: String,
    country: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    elevation: Vec<f64>,
}

impl Geocoder {
    pub fn from_config(cfg: &GeocodingConfig) -> Self {
        Self {
            search_url: cfg.search_url.trim_end_matches('/').to_string(),
            elevation_url: cfg.elevation_url.trim_end_matches('/').to_string(),
            country: cfg.country.clone(),
            http: Client::new(),
        }
    }

    /// Search for `query` in the configured country, then look up the
    /// elevation of the first hit.
    pub async fn locate(&self, query: &str) -> Result<Place, LocateError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LocateError::NotFound(String::new()));
        }

        let url = format!("{}/search", self.search_url);
        info!("Searching for '{query}' via {url}");
        let body = self
            .get(&url, &[
                ("format", "json".to_string()),
                ("q", format!("{query},{}", self.country)),
                ("limit", "1".to_string()),
            ])
            .await?;

        let (name, coordinates) =
            parse_search(&body)?.ok_or_else(|| LocateError::NotFound(query.to_string()))?;

        let url = format!("{}/v1/elevation", self.elevation_url);
        let body = self
            .get(&url, &[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
            ])
            .await?;
        let elevation = parse_elevation(&body)?;

        Ok(Place {
            name,
            coordinates,
            elevation,
        })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, LocateError> {
        let res = self
            .http
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .query(query)
            .send()
            .await
            .map_err(|e| LocateError::SearchFailed(format!("request to {url} failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| LocateError::SearchFailed(format!("reading {url} failed: {e}")))?;

        if !status.is_success() {
            return Err(LocateError::SearchFailed(format!(
                "{url} answered {status}: {}",
                truncate_body(&body)
            )));
        }
        Ok(body)
    }
}

/// First search hit, or `None` for an empty result list.
pub fn parse_search(body: &str) -> Result<Option<(String, Coordinates)>, LocateError> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|e| LocateError::SearchFailed(format!("invalid search response ({e})")))?;

    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let coordinate = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| LocateError::SearchFailed(format!("invalid coordinate '{raw}'")))
    };

    Ok(Some((
        hit.display_name,
        Coordinates {
            latitude: coordinate(&hit.lat)?,
            longitude: coordinate(&hit.lon)?,
        },
    )))
}

pub fn parse_elevation(body: &str) -> Result<Option<f64>, LocateError> {
    let parsed: ElevationResponse = serde_json::from_str(body)
        .map_err(|e| LocateError::SearchFailed(format!("invalid elevation response ({e})")))?;
    Ok(parsed.elevation.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hit_is_used() {
        let body = r#"[
            {"place_id": 1, "lat": "47.2186371", "lon": "-1.5541362",
             "display_name": "Nantes, Loire-Atlantique, Pays de la Loire, France"},
            {"place_id": 2, "lat": "0", "lon": "0", "display_name": "Elsewhere"}
        ]"#;

        let (name, coordinates) = parse_search(body).unwrap().unwrap();
        assert_eq!(name, "Nantes, Loire-Atlantique, Pays de la Loire, France");
        assert_eq!(coordinates.latitude, 47.2186371);
        assert_eq!(coordinates.longitude, -1.5541362);
    }

    #[test]
    fn empty_result_is_none() {
        assert_eq!(parse_search("[]").unwrap(), None);
    }

    #[test]
    fn bad_coordinate_fails_search() {
        let body = r#"[{"lat": "north", "lon": "1", "display_name": "X"}]"#;
        assert!(matches!(
            parse_search(body),
            Err(LocateError::SearchFailed(_))
        ));
    }

    #[test]
    fn elevation_takes_first_value() {
        assert_eq!(parse_elevation(r#"{"elevation": [38.0]}"#).unwrap(), Some(38.0));
        assert_eq!(parse_elevation(r#"{"elevation": []}"#).unwrap(), None);
        assert!(parse_elevation("{}").is_err());
    }

    #[tokio::test]
    async fn error_status_fails_search() {
        let base = crate::source::fixture::serve("500 Internal Server Error", "boom").await;
        let geocoder = Geocoder::from_config(&GeocodingConfig {
            search_url: base,
            ..Default::default()
        });

        let err = geocoder.locate("Nantes").await.unwrap_err();
        assert!(matches!(err, LocateError::SearchFailed(msg) if msg.contains("500") && msg.contains("boom")));
    }

    #[tokio::test]
    async fn empty_hit_list_is_not_found() {
        let base = crate::source::fixture::serve("200 OK", "[]").await;
        let geocoder = Geocoder::from_config(&GeocodingConfig {
            search_url: base,
            ..Default::default()
        });

        let err = geocoder.locate("Atlantis").await.unwrap_err();
        assert!(matches!(err, LocateError::NotFound(name) if name == "Atlantis"));
    }

    #[tokio::test]
    async fn blank_query_is_not_found() {
        let geocoder = Geocoder::from_config(&GeocodingConfig::default());
        assert!(matches!(
            geocoder.locate("   ").await,
            Err(LocateError::NotFound(_))
        ));
    }
}
