use std::{fmt, str::FromStr, time::Duration};

/// A strictly positive interval written in Go `time.ParseDuration` syntax,
/// e.g. `30s`, `1h30m`, or `250ms`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Period(Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("period must be greater than zero")]
    NotPositive,

    #[error("period is too large")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

impl From<Period> for Duration {
    fn from(Period(duration): Period) -> Self {
        duration
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl FromStr for Period {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('-') {
            return Err(ParseError::NotPositive);
        }
        let duration = parse(s.trim_start_matches('+'))?;
        if duration.is_zero() {
            return Err(ParseError::NotPositive);
        }
        Ok(Self(duration))
    }
}

/// Parses an unsigned Go duration: a sequence of decimal numbers, each with
/// a unit suffix.
fn parse(mut s: &str) -> Result<Duration, ParseError> {
    fn unit(unit: &str) -> Result<Duration, ParseError> {
        const MINUTE: Duration = Duration::from_secs(60);
        match unit {
            "ns" => Ok(Duration::from_nanos(1)),
            // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
            "us" | "\u{00b5}s" | "\u{03bc}s" => Ok(Duration::from_micros(1)),
            "ms" => Ok(Duration::from_millis(1)),
            "s" => Ok(Duration::from_secs(1)),
            "m" => Ok(MINUTE),
            "h" => Ok(MINUTE * 60),
            _ => Err(ParseError::InvalidUnit),
        }
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(ParseError::NoUnit);
    }

    let mut total = Duration::ZERO;
    while !s.is_empty() {
        let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) else {
            return Err(ParseError::NoUnit);
        };
        let (val, rest) = s.split_at(unit_start);
        let val = val.parse::<f64>()?;
        // Only the leading sign is accepted.
        if val.is_sign_negative() {
            return Err(ParseError::NotPositive);
        }
        let (u, rest) = match rest.find(|c: char| !c.is_alphabetic()) {
            Some(end) => rest.split_at(end),
            None => (rest, ""),
        };
        let part = Duration::try_from_secs_f64(unit(u)?.as_secs_f64() * val)
            .map_err(|_| ParseError::Overflow)?;
        total = total.checked_add(part).ok_or(ParseError::Overflow)?;
        s = rest;
    }
    Ok(total)
}
