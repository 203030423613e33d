//! Input validation utilities

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{RideError, RideResult};
use crate::models::NewRide;

/// Parse a `YYYY-MM-DD` calendar date
///
/// The lexical shape is checked first so that values chrono would accept
/// loosely (single-digit months, signed years) are rejected.
pub fn parse_ride_date(date: &str) -> RideResult<NaiveDate> {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DATE_REGEX
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Failed to compile date regex"));

    if !regex.is_match(date) {
        return Err(invalid_date());
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid_date())
}

/// Validate a 24-hour `HH:MM` time of day
pub fn validate_ride_time(time: &str) -> RideResult<()> {
    static TIME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TIME_REGEX.get_or_init(|| {
        Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("Failed to compile time regex")
    });

    if !regex.is_match(time) {
        return Err(RideError::Validation(
            "Invalid time format, expected HH:mm".to_string(),
        ));
    }

    Ok(())
}

/// Validate a ride payload, returning its parsed date
pub fn validate_new_ride(ride: &NewRide) -> RideResult<NaiveDate> {
    if ride.origin.trim().is_empty() {
        return Err(RideError::Validation("Origin is required".to_string()));
    }

    if ride.destination.trim().is_empty() {
        return Err(RideError::Validation("Destination is required".to_string()));
    }

    validate_ride_time(&ride.time)?;
    let date = parse_ride_date(&ride.date)?;

    if ride.seats < 1 {
        return Err(RideError::Validation(
            "A ride must offer at least one seat".to_string(),
        ));
    }

    if !ride.price.is_finite() || ride.price < 0.0 {
        return Err(RideError::Validation(
            "Price must be a non-negative amount".to_string(),
        ));
    }

    Ok(date)
}

/// Parse an entity identifier received from a caller
pub fn parse_id(raw: &str, entity: &str) -> RideResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| RideError::Validation(format!("Invalid {} ID", entity)))
}

fn invalid_date() -> RideError {
    RideError::Validation("Invalid date format, expected YYYY-MM-DD".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride(date: &str, time: &str) -> NewRide {
        NewRide {
            origin: "College Campus".to_string(),
            destination: "City Airport".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            seats: 3,
            price: 12.5,
        }
    }

    #[test]
    fn test_parse_ride_date() {
        assert_eq!(
            parse_ride_date("2025-06-10").unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
        );
        assert!(parse_ride_date("2025-6-10").is_err());
        assert!(parse_ride_date("2025-02-30").is_err());
        assert!(parse_ride_date("10/06/2025").is_err());
        assert!(parse_ride_date(" 2025-06-10").is_err());
    }

    #[test]
    fn test_validate_ride_time() {
        assert!(validate_ride_time("00:00").is_ok());
        assert!(validate_ride_time("15:30").is_ok());
        assert!(validate_ride_time("23:59").is_ok());
        assert!(validate_ride_time("24:00").is_err());
        assert!(validate_ride_time("9:30").is_err());
        assert!(validate_ride_time("12:60").is_err());
        assert!(validate_ride_time("3pm").is_err());
    }

    #[test]
    fn test_validate_new_ride() {
        assert!(validate_new_ride(&ride("2025-06-10", "09:15")).is_ok());
        assert!(matches!(
            validate_new_ride(&ride("2025-06-10", "9:15")),
            Err(RideError::Validation(_))
        ));

        let mut no_seats = ride("2025-06-10", "09:15");
        no_seats.seats = 0;
        assert!(validate_new_ride(&no_seats).is_err());

        let mut negative_price = ride("2025-06-10", "09:15");
        negative_price.price = -1.0;
        assert!(validate_new_ride(&negative_price).is_err());

        let mut blank_origin = ride("2025-06-10", "09:15");
        blank_origin.origin = "  ".to_string();
        assert!(validate_new_ride(&blank_origin).is_err());
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "ride").unwrap(), id);
        assert!(matches!(parse_id("42", "ride"), Err(RideError::Validation(msg)) if msg == "Invalid ride ID"));
    }
}
