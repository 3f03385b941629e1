use crate::{
    error::ValidationError,
    model::RawWeatherPayload,
    normalize::WindUnit,
};

const MAX_OFFSET_SECONDS: i32 = 24 * 3600;

/// Checks the structural invariants of a freshly loaded payload.
///
/// Groups are checked in a fixed order (metadata, units, hourly presence,
/// hourly lengths, daily lengths) and the first failure is returned, so the
/// same payload always yields the same message.
pub fn validate(payload: RawWeatherPayload) -> Result<RawWeatherPayload, ValidationError> {
    check_metadata(&payload)?;
    check_units(&payload)?;
    check_hourly_presence(&payload)?;
    check_hourly_lengths(&payload)?;
    check_daily_lengths(&payload)?;
    Ok(payload)
}

fn check_metadata(payload: &RawWeatherPayload) -> Result<(), ValidationError> {
    let metadata = payload
        .metadata
        .as_ref()
        .ok_or_else(|| ValidationError::Metadata("section is missing".into()))?;

    for (name, value) in [("latitude", metadata.latitude), ("longitude", metadata.longitude)] {
        match value {
            Some(v) if v.is_finite() => {}
            _ => return Err(ValidationError::Metadata(format!("{name} is not a number"))),
        }
    }

    if metadata.utc_offset_seconds.abs() >= MAX_OFFSET_SECONDS {
        return Err(ValidationError::Metadata(format!(
            "UTC offset of {}s is out of range",
            metadata.utc_offset_seconds
        )));
    }

    Ok(())
}

fn check_units(payload: &RawWeatherPayload) -> Result<(), ValidationError> {
    let units = payload
        .units
        .as_ref()
        .ok_or_else(|| ValidationError::Units("section is missing".into()))?;

    if units.temperature.is_none() {
        return Err(ValidationError::Units("temperature unit is missing".into()));
    }

    if let Some(unit) = &units.wind_speed {
        if WindUnit::parse(unit).is_none() {
            return Err(ValidationError::Units(format!(
                "unsupported wind speed unit '{unit}'"
            )));
        }
    }

    Ok(())
}

fn check_hourly_presence(payload: &RawWeatherPayload) -> Result<(), ValidationError> {
    let hourly = payload
        .hourly
        .as_ref()
        .ok_or_else(|| ValidationError::HourlyMissing("section is missing".into()))?;

    if hourly.time.is_none() {
        return Err(ValidationError::HourlyMissing("'time' array is missing".into()));
    }
    if hourly.temperature.is_none() {
        return Err(ValidationError::HourlyMissing(
            "'temperature' array is missing".into(),
        ));
    }

    Ok(())
}

fn check_hourly_lengths(payload: &RawWeatherPayload) -> Result<(), ValidationError> {
    let Some(hourly) = payload.hourly.as_ref() else {
        return Ok(());
    };
    let expected = hourly.time.as_ref().map_or(0, Vec::len);

    for (field, values) in hourly.value_arrays() {
        if values.len() != expected {
            return Err(ValidationError::HourlyLength {
                field,
                expected,
                found: values.len(),
            });
        }
    }

    Ok(())
}

fn check_daily_lengths(payload: &RawWeatherPayload) -> Result<(), ValidationError> {
    let Some(daily) = payload.daily.as_ref() else {
        return Ok(());
    };
    let expected = daily.time.len();

    for (field, found) in [("sunrise", daily.sunrise.len()), ("sunset", daily.sunset.len())] {
        if found != expected {
            return Err(ValidationError::DailyLength {
                field,
                expected,
                found,
            });
        }
    }

    Ok(())
}
