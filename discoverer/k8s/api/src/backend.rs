use regex::Regex;
use std::{fmt, str::FromStr};
use thiserror::Error;

const BACKEND_NAME_REGEX: &str = r"^[a-z]([-a-z0-9]*[a-z0-9])?$";

/// Identifies one registry integration among all of those feeding the same
/// cluster.
///
/// Every resource a backend projects is named and labeled after it, so it
/// must be unique per target cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendName(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid backend name {0:?}: must match {BACKEND_NAME_REGEX}")]
pub struct InvalidBackendName(String);

// === impl BackendName ===

impl BackendName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BackendName {
    type Err = InvalidBackendName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let regex = Regex::new(BACKEND_NAME_REGEX).expect("backend name regex must compile");
        if !regex.is_match(s) {
            return Err(InvalidBackendName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for BackendName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
