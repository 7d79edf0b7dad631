use crate::{CoreError, CoreResult};

pub fn validate_flight_id(id: i64) -> CoreResult<i64> {
    if id < 1 {
        return Err(CoreError::ValidationError(format!(
            "flight id must be positive, got {}",
            id
        )));
    }
    Ok(id)
}

pub fn validate_seats(seats: i64) -> CoreResult<i64> {
    if seats < 1 {
        return Err(CoreError::ValidationError(format!(
            "seat count must be at least 1, got {}",
            seats
        )));
    }
    Ok(seats)
}

pub fn validate_route(source: &str, destination: &str) -> CoreResult<()> {
    if source.is_empty() || destination.is_empty() {
        return Err(CoreError::ValidationError(
            "source and destination are required".to_string(),
        ));
    }
    Ok(())
}

/// Monitor intervals are whole seconds in `1..=max_seconds`.
pub fn validate_monitor_duration(seconds: i64, max_seconds: u64) -> CoreResult<u64> {
    if seconds < 1 || seconds as u64 > max_seconds {
        return Err(CoreError::ValidationError(format!(
            "monitor duration must be between 1 and {} seconds, got {}",
            max_seconds, seconds
        )));
    }
    Ok(seconds as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ranges() {
        assert_eq!(validate_flight_id(7), Ok(7));
        assert!(validate_flight_id(0).is_err());
        assert_eq!(validate_seats(1), Ok(1));
        assert!(validate_seats(-2).is_err());
        assert_eq!(validate_monitor_duration(30, 3600), Ok(30));
        assert!(validate_monitor_duration(0, 3600).is_err());
        assert!(validate_monitor_duration(3601, 3600).is_err());
    }

    #[test]
    fn test_route_requires_both_ends() {
        assert!(validate_route("SIN", "NRT").is_ok());
        let err = validate_route("SIN", "").unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: source and destination are required");
    }
}
