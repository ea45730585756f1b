//! Utility functions used by Kaskade, and available when preparing load tests.

use num_format::{Locale, ToFormattedString};
use std::time::Duration;

/// Join a base url and a path fragment with exactly one `/` between them.
///
/// An empty fragment returns the base unchanged. No validation is performed, a
/// malformed url fails later when the request is built.
///
/// # Example
/// ```rust
/// use kaskade::util;
///
/// assert_eq!(util::compose_url("http://h/", "/p"), "http://h/p");
/// assert_eq!(util::compose_url("http://h", "p"), "http://h/p");
/// assert_eq!(util::compose_url("http://h/", "p"), "http://h/p");
/// assert_eq!(util::compose_url("http://h", ""), "http://h");
/// ```
pub fn compose_url(base: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return base.to_string();
    }

    match (base.ends_with('/'), fragment.starts_with('/')) {
        (true, true) => format!("{}{}", base, &fragment[1..]),
        (false, false) => format!("{}/{}", base, fragment),
        _ => format!("{}{}", base, fragment),
    }
}

/// Convert a duration to fractional milliseconds.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use kaskade::util;
///
/// assert_eq!(util::duration_ms(Duration::from_micros(1_500)), 1.5);
/// ```
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Format large counts with thousands separators for log output.
pub(crate) fn format_number(number: usize) -> String {
    number.to_formatted_string(&Locale::en)
}
