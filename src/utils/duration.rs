//! Nanosecond quantity decoding.
//!
//! Flow monitor logs render every timestamp and time sum as a signed decimal
//! followed by the `ns` unit (e.g. `+2000000000.0ns`). Only that one unit is
//! recognised; anything else is rejected rather than guessed at.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::FlowmonError;

/// Match: "+2000000000.0ns", "-15ns", "42.5ns"
static NS_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d+)(?:\.(\d*))?ns$").expect("Invalid ns quantity regex")
});

/// Nanoseconds per second
pub const NS_PER_SEC: f64 = 1e9;

/// Parse a nanosecond timestamp to an integer count of nanoseconds.
///
/// Any fractional part is truncated toward zero.
///
/// # Examples
/// ```
/// use flowmetrics::utils::duration::parse_time_ns;
///
/// assert_eq!(parse_time_ns("+2000000000.0ns").unwrap(), 2_000_000_000);
/// assert_eq!(parse_time_ns("15ns").unwrap(), 15);
/// assert!(parse_time_ns("15ms").is_err());
/// ```
pub fn parse_time_ns(value: &str) -> Result<i64, FlowmonError> {
    let caps = NS_QUANTITY
        .captures(value)
        .ok_or_else(|| shape_error(value))?;

    let negative = &caps[1] == "-";
    let magnitude: i64 = caps[2]
        .parse()
        .map_err(|_| FlowmonError::format("time", value, "integer part out of range"))?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse a nanosecond quantity keeping its fractional part.
///
/// Used for sums (delay, jitter) where ns-3 may emit sub-nanosecond digits.
pub fn parse_quantity_ns(value: &str) -> Result<f64, FlowmonError> {
    if !NS_QUANTITY.is_match(value) {
        return Err(shape_error(value));
    }

    value[..value.len() - 2]
        .parse()
        .map_err(|_| FlowmonError::format("time", value, "not a decimal number"))
}

/// Convert a nanosecond quantity to seconds
pub fn ns_to_seconds(ns: f64) -> f64 {
    ns / NS_PER_SEC
}

fn shape_error(value: &str) -> FlowmonError {
    if value.ends_with("ns") {
        FlowmonError::format("time", value, "expected a decimal number before 'ns'")
    } else {
        FlowmonError::format("time", value, "expected the 'ns' unit suffix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_ns() {
        assert_eq!(parse_time_ns("+0.0ns").unwrap(), 0);
        assert_eq!(parse_time_ns("+2000000000.0ns").unwrap(), 2_000_000_000);
        assert_eq!(parse_time_ns("1500ns").unwrap(), 1500);
        assert_eq!(parse_time_ns("-250.0ns").unwrap(), -250);
        assert_eq!(parse_time_ns("+7.9ns").unwrap(), 7);
        assert_eq!(parse_time_ns("12.ns").unwrap(), 12);
    }

    #[test]
    fn test_parse_quantity_ns() {
        assert_eq!(parse_quantity_ns("+500000000.0ns").unwrap(), 500_000_000.0);
        assert!((parse_quantity_ns("+12.75ns").unwrap() - 12.75).abs() < 1e-12);
        assert_eq!(parse_quantity_ns("-3ns").unwrap(), -3.0);
    }

    #[test]
    fn test_round_trip_up_to_2_pow_53() {
        let samples: [i64; 8] = [
            0,
            1,
            999,
            1_000_000_000,
            u32::MAX as i64,
            (1i64 << 53) - 1,
            1i64 << 53,
            123_456_789_012_345,
        ];
        for n in samples {
            assert_eq!(parse_time_ns(&format!("{}ns", n)).unwrap(), n);
            assert_eq!(parse_time_ns(&format!("+{}.0ns", n)).unwrap(), n);
            assert_eq!(parse_quantity_ns(&format!("+{}.0ns", n)).unwrap(), n as f64);
        }
    }

    #[test]
    fn test_rejects_other_units() {
        for bad in ["", "ns", "12", "12s", "12ms", "12us", "12 ns", "12NS", "+.5ns", "1e9ns", "abcns"] {
            let err = parse_time_ns(bad).unwrap_err();
            assert!(matches!(err, FlowmonError::Format { .. }), "{bad} should be a format error");
            assert!(parse_quantity_ns(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_integer_overflow_is_format_error() {
        let err = parse_time_ns("99999999999999999999ns").unwrap_err();
        assert!(matches!(err, FlowmonError::Format { .. }));
    }
}
