//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core
//! services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in
//! multi-threaded runtimes and test harnesses. Environment values are parsed
//! by pure helpers here so the lookup itself stays in the binary.

use crate::{RecordError, RecordResult};
use std::path::{Path, PathBuf};

/// Default cap on rows returned by doctor-scoped patient listings.
pub const DEFAULT_LISTING_LIMIT: usize = 50;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    facility_seed_path: Option<PathBuf>,
    listing_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            facility_seed_path: None,
            listing_limit: DEFAULT_LISTING_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `facility_seed_path` points at an optional JSON file of facility
    /// credentials loaded into the directory at startup. `listing_limit`
    /// bounds doctor-scoped listings and must be non-zero.
    pub fn new(facility_seed_path: Option<PathBuf>, listing_limit: usize) -> RecordResult<Self> {
        if listing_limit == 0 {
            return Err(RecordError::validation(vec!["listingLimit"]));
        }
        Ok(Self {
            facility_seed_path,
            listing_limit,
        })
    }

    pub fn facility_seed_path(&self) -> Option<&Path> {
        self.facility_seed_path.as_deref()
    }

    pub fn listing_limit(&self) -> usize {
        self.listing_limit
    }
}

/// Parse the listing limit from an optional environment value.
///
/// `None` or an empty/whitespace value yields [`DEFAULT_LISTING_LIMIT`].
pub fn listing_limit_from_env_value(value: Option<String>) -> RecordResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let Some(value) = value else {
        return Ok(DEFAULT_LISTING_LIMIT);
    };

    let parsed: usize = value
        .parse()
        .map_err(|_| RecordError::validation(vec!["listingLimit"]))?;
    if parsed == 0 {
        return Err(RecordError::validation(vec!["listingLimit"]));
    }
    Ok(parsed)
}
