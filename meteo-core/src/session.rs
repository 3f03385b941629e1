//! Session state: current payload, window and filtered records.
//!
//! Every trigger (load, window change, place change) swaps whole snapshots;
//! nothing shared is mutated in place. Loads are tagged with a generation so
//! a slow response cannot overwrite the result of a newer one.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info, warn};

use crate::{
    error::{LocateError, MeteoError},
    model::{Coordinates, Place, RawWeatherPayload, WeatherRecord},
    normalize::normalize,
    validate::validate,
    window::{DateWindow, Span, WindowPolicy, default_window, filter_records},
};

/// Handed out by [`Session::begin_load`], presented back on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    Failed,
    /// A newer load was started; the result was dropped.
    Stale,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    policy: WindowPolicy,
    coordinates: Option<Coordinates>,
    place: Option<Place>,
    payload: Option<Arc<RawWeatherPayload>>,
    records: Arc<[WeatherRecord]>,
    window: DateWindow,
    filtered: Arc<[WeatherRecord]>,
    error: Option<String>,
}

impl Session {
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Applies a load result if `ticket` is still the latest one.
    ///
    /// Success validates and normalizes the payload, then picks the default
    /// window on the first load with records, or fits the current window to
    /// the new span.
    /// Failure keeps the previous records and stores a diagnostic.
    pub fn commit_load<E>(
        &mut self,
        ticket: LoadTicket,
        result: Result<RawWeatherPayload, E>,
        now: DateTime<Utc>,
    ) -> Commit
    where
        E: Into<MeteoError>,
    {
        if ticket.generation != self.generation {
            debug!(
                "Dropping load #{} result, #{} is current",
                ticket.generation, self.generation
            );
            return Commit::Stale;
        }

        let validated = result
            .map_err(Into::<MeteoError>::into)
            .and_then(|p| validate(p).map_err(MeteoError::from));

        let payload = match validated {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Load #{} failed: {err}", ticket.generation);
                self.error = Some(err.diagnostic());
                return Commit::Failed;
            }
        };

        let records: Arc<[WeatherRecord]> = normalize(&payload).into();
        // An empty earlier load never set a window.
        let first_load = self.records.is_empty();

        if let Some(span) = Span::of(&records) {
            self.window = if first_load {
                default_window(&span, self.policy, now)
            } else {
                self.window.fit_to(&span)
            };
            debug!("Window set to {:?}", self.window);
        }

        info!("Load #{} applied: {} records", ticket.generation, records.len());
        self.payload = Some(Arc::new(payload));
        self.records = records;
        self.error = None;
        self.refilter();
        Commit::Applied
    }

    pub fn set_window(&mut self, window: DateWindow) {
        self.window = window;
        self.refilter();
    }

    /// Switches to a resolved place. The caller reloads with the new
    /// coordinates.
    pub fn apply_place(&mut self, place: Place) {
        self.coordinates = Some(place.coordinates);
        self.place = Some(place);
        self.error = None;
    }

    /// Records a failed search; coordinates and data stay as they were.
    pub fn location_failed(&mut self, err: LocateError) {
        self.error = Some(MeteoError::from(err).diagnostic());
    }

    fn refilter(&mut self) {
        self.filtered = filter_records(&self.records, &self.window).into();
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn filtered(&self) -> &[WeatherRecord] {
        &self.filtered
    }

    pub fn window(&self) -> DateWindow {
        self.window
    }

    /// UTC offset of the loaded data, if any.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.records.first().map(|r| *r.timestamp.offset())
    }

    pub fn payload(&self) -> Option<&RawWeatherPayload> {
        self.payload.as_deref()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn place(&self) -> Option<&Place> {
        self.place.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::LoadError,
        model::{HourlySeries, Metadata, Units},
    };
    use chrono::{Duration, NaiveDate, TimeZone};

    fn payload(first_day: u32, hours: i64) -> RawWeatherPayload {
        let t0 = NaiveDate::from_ymd_opt(2024, 6, first_day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RawWeatherPayload {
            metadata: Some(Metadata {
                latitude: Some(48.85),
                longitude: Some(2.35),
                ..Default::default()
            }),
            units: Some(Units {
                temperature: Some("°C".into()),
                wind_speed: Some("km/h".into()),
                precipitation: None,
            }),
            hourly: Some(HourlySeries {
                time: Some((0..hours).map(|h| t0 + Duration::hours(h)).collect()),
                temperature: Some((0..hours).map(|h| Some(h as f64)).collect()),
                ..Default::default()
            }),
            daily: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_load_uses_full_span() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let ticket = session.begin_load();

        let commit = session.commit_load::<LoadError>(ticket, Ok(payload(1, 48)), now());

        assert_eq!(commit, Commit::Applied);
        assert_eq!(session.records().len(), 48);
        assert_eq!(session.filtered().len(), 48);
        assert!(session.error().is_none());
    }

    #[test]
    fn empty_first_load_defers_the_default_window() {
        let mut session = Session::new(WindowPolicy::TodayTomorrow);
        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 0)), now());
        assert!(session.payload().is_some());
        assert_eq!(session.window(), DateWindow::default());

        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 72)), now());

        // Today from `now`, through the end of tomorrow.
        let offset = session.offset().unwrap();
        let window = session.window();
        assert_eq!(window.start, Some(now().with_timezone(&offset)));
        assert_eq!(
            window.end,
            Some(offset.with_ymd_and_hms(2024, 6, 2, 23, 59, 59).unwrap())
        );
        assert_eq!(session.filtered().len(), 36);
    }

    #[test]
    fn stale_result_is_dropped() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let old = session.begin_load();
        let new = session.begin_load();

        assert_eq!(
            session.commit_load::<LoadError>(new, Ok(payload(1, 24)), now()),
            Commit::Applied
        );
        assert_eq!(
            session.commit_load::<LoadError>(old, Ok(payload(1, 2)), now()),
            Commit::Stale
        );
        assert_eq!(session.records().len(), 24);
    }

    #[test]
    fn failure_keeps_previous_records() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 24)), now());

        let ticket = session.begin_load();
        let commit = session.commit_load(
            ticket,
            Err(LoadError::NotFound("meteo.json".into())),
            now(),
        );

        assert_eq!(commit, Commit::Failed);
        assert_eq!(session.filtered().len(), 24);
        assert!(session.error().unwrap().contains("meteo.json"));
    }

    #[test]
    fn invalid_payload_is_not_applied() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let mut bad = payload(1, 3);
        bad.metadata = None;

        let ticket = session.begin_load();
        let commit = session.commit_load::<LoadError>(ticket, Ok(bad), now());

        assert_eq!(commit, Commit::Failed);
        assert!(session.records().is_empty());
        assert!(session.payload().is_none());
        assert!(session.error().unwrap().contains("Metadata"));
    }

    #[test]
    fn window_change_refilters() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 24)), now());

        let offset = session.offset().unwrap();
        let start = offset.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let end = offset.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();
        session.set_window(DateWindow::new(Some(start), Some(end)));

        let temps: Vec<_> = session.filtered().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![Some(10.0), Some(11.0)]);
    }

    #[test]
    fn reload_keeps_window_inside_new_span() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 72)), now());

        let offset = session.offset().unwrap();
        let chosen = DateWindow::new(
            Some(offset.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()),
            Some(offset.with_ymd_and_hms(2024, 6, 2, 5, 0, 0).unwrap()),
        );
        session.set_window(chosen);

        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 96)), now());
        assert_eq!(session.window(), chosen);
        assert_eq!(session.filtered().len(), 6);
    }

    #[test]
    fn reload_clamps_window_outside_new_span() {
        let mut session = Session::new(WindowPolicy::FullSpan);
        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(1, 24)), now());

        let ticket = session.begin_load();
        session.commit_load::<LoadError>(ticket, Ok(payload(5, 24)), now());

        let offset = session.offset().unwrap();
        let window = session.window();
        assert_eq!(
            window.start,
            Some(offset.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(window.end, window.start);
        assert_eq!(session.filtered().len(), 1);
    }

    #[test]
    fn place_change_and_failed_search() {
        let mut session = Session::new(WindowPolicy::TodayTomorrow).with_coordinates(Coordinates {
            latitude: 48.85,
            longitude: 2.35,
        });

        session.location_failed(LocateError::NotFound("Atlantis".into()));
        assert_eq!(session.coordinates().unwrap().latitude, 48.85);
        assert!(session.error().unwrap().contains("Atlantis"));

        session.apply_place(Place {
            name: "Lyon".into(),
            coordinates: Coordinates {
                latitude: 45.76,
                longitude: 4.84,
            },
            elevation: Some(173.0),
        });
        assert_eq!(session.coordinates().unwrap().latitude, 45.76);
        assert_eq!(session.place().unwrap().elevation, Some(173.0));
        assert!(session.error().is_none());
    }
}
