/// Input validators
/// - Email shape and length limits on registration
/// - Real calendar dates in `YYYY-MM-DD` for profile updates

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_LOCAL_PART_LENGTH: usize = 64;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // chrono alone would accept unpadded "1990-2-3"
    static ref DATE_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Validates an email address and returns it trimmed
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    let local_part_too_long = trimmed
        .split('@')
        .next()
        .map_or(false, |local| local.len() > MAX_LOCAL_PART_LENGTH);
    if local_part_too_long {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Parses a date of birth: `YYYY-MM-DD` and a day that exists
/// (no April 31, no February 29 outside leap years).
pub fn parse_dob(dob: &str) -> Result<NaiveDate, ValidationError> {
    if !DATE_REGEX.is_match(dob) {
        return Err(ValidationError::InvalidDate);
    }

    NaiveDate::parse_from_str(dob, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate)
}
