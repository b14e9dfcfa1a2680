//! Runtime settings.
//!
//! Loaded from `quickdata.toml`; every field has a default so an empty file
//! (or no file) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuickDataError, Result};
use crate::geo::DistanceUnit;

pub const CONFIG_FILE: &str = "quickdata.toml";

/// What the executor does with a `where` clause it cannot compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicatePolicy {
    /// Fail the search with `InvalidPredicate`
    #[default]
    Abort,
    /// Drop the clause and log a warning
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Page size when a filter does not set one
    pub per_page: u32,
    /// Search radius when a caller gives coordinates but no distance.
    /// `None` means no limit.
    pub default_distance: Option<f64>,
    pub distance_unit: DistanceUnit,
    /// Deepest nesting the relationship synchronizer will follow
    pub max_sync_depth: usize,
    pub invalid_predicates: PredicatePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            per_page: 20,
            default_distance: None,
            distance_unit: DistanceUnit::Kilometers,
            max_sync_depth: 4,
            invalid_predicates: PredicatePolicy::Abort,
        }
    }
}

impl Settings {
    /// Load from default config file
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self =
            toml::from_str(&content).map_err(|e| QuickDataError::Config(path.into(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| QuickDataError::Config(Path::new("<inline>").into(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 {
            return Err(QuickDataError::InvalidArgument(
                "per_page must be greater than zero".into(),
            ));
        }
        if self.max_sync_depth == 0 {
            return Err(QuickDataError::InvalidArgument(
                "max_sync_depth must be greater than zero".into(),
            ));
        }
        if let Some(d) = self.default_distance
            && !(d.is_finite() && d > 0.0)
        {
            return Err(QuickDataError::InvalidArgument(format!(
                "default_distance must be a positive number, got {d}"
            )));
        }
        Ok(())
    }
}
