//! Field format rules for UK register data.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

static PHONE_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-\(\)]").expect("valid regex"));

static PHONE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // Standard
        Regex::new(r"^(\+44|0044|44)?[1-9]\d{8,9}$").expect("valid regex"),
        // Mobile
        Regex::new(r"^(\+44|0044|44)?[78]\d{9}$").expect("valid regex"),
        // Geographic
        Regex::new(r"^(\+44|0044|44)?[12]\d{8}$").expect("valid regex"),
    ]
});

static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}$").expect("valid regex"));

static REGISTRATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6,7}$").expect("valid regex"));

/// Inclusive rating bounds.
pub const RATING_RANGE: (f64, f64) = (0.0, 5.0);

#[must_use]
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Accepts UK numbers with an optional `+44`, `0044` or `44` prefix after
/// stripping whitespace, dashes and parentheses.
#[must_use]
pub fn validate_phone_uk(phone: &str) -> bool {
    let cleaned = PHONE_NOISE_RE.replace_all(phone, "");
    PHONE_RES.iter().any(|re| re.is_match(&cleaned))
}

/// Case-insensitive; surrounding whitespace is ignored.
#[must_use]
pub fn validate_postcode_uk(postcode: &str) -> bool {
    POSTCODE_RE.is_match(postcode.trim().to_uppercase().as_str())
}

/// SRA organisation and solicitor numbers are 6 or 7 digits.
#[must_use]
pub fn validate_registration_number(number: &str) -> bool {
    REGISTRATION_RE.is_match(number)
}

/// `YYYY-MM-DD` calendar date.
#[must_use]
pub fn validate_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

#[must_use]
pub fn validate_rating(rating: f64) -> bool {
    (RATING_RANGE.0..=RATING_RANGE.1).contains(&rating)
}
