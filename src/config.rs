use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NaturwbError, Result};
use crate::model::StdVariable;

pub const BUILTIN_ENGINE_CONFIG: &str = include_str!("data/engine_config.json");

/// Tunables of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buffer radii for the land-use search, strictly increasing.
    pub search_radii_km: Vec<f64>,
    /// Allowed deviation of the aggregated precipitation per simulation polygon.
    pub precipitation_tolerance_mm: f64,
    /// Allowed deviation of the coefficient-product sum from 1.
    pub coefficient_tolerance: f64,
    /// `lanu_flag` value marking a land-use forced onto a single soil profile.
    pub forced_landuse_flag: u8,
    /// Shares at or below this value are not reported.
    pub materiality_share: f64,
    /// Undefined share above which the whole area counts as undefined.
    pub undefined_area_all_share: f64,
    pub std_thresholds: BTreeMap<StdVariable, f64>,
    pub pool_max_queries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_radii_km: vec![30.0, 60.0, 90.0, 120.0],
            precipitation_tolerance_mm: 0.01,
            coefficient_tolerance: 1e-5,
            forced_landuse_flag: 2,
            materiality_share: 1e-4,
            undefined_area_all_share: 0.9,
            std_thresholds: BTreeMap::from([
                (StdVariable::Slope, 20.0),
                (StdVariable::WinterPrecipitation, 40.0),
                (StdVariable::SummerPrecipitation, 40.0),
                (StdVariable::Temperature, 0.5),
                (StdVariable::Evapotranspiration, 25.0),
                (StdVariable::Sunshine, 0.4),
            ]),
            pool_max_queries: 20,
        }
    }
}

impl EngineConfig {
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_ENGINE_CONFIG)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_radii_km.is_empty() {
            return Err(NaturwbError::Config(
                "search_radii_km must not be empty".into(),
            ));
        }
        if self.search_radii_km.iter().any(|r| !(*r > 0.0)) {
            return Err(NaturwbError::Config(
                "search_radii_km must be positive".into(),
            ));
        }
        if self.search_radii_km.windows(2).any(|w| w[0] >= w[1]) {
            return Err(NaturwbError::Config(
                "search_radii_km must be strictly increasing".into(),
            ));
        }
        for (name, value) in [
            ("precipitation_tolerance_mm", self.precipitation_tolerance_mm),
            ("coefficient_tolerance", self.coefficient_tolerance),
            ("materiality_share", self.materiality_share),
        ] {
            if !(value >= 0.0) {
                return Err(NaturwbError::Config(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if self.pool_max_queries == 0 {
            return Err(NaturwbError::Config(
                "pool_max_queries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn std_threshold(&self, variable: StdVariable) -> Option<f64> {
        self.std_thresholds.get(&variable).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_default() {
        assert_eq!(EngineConfig::builtin().unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "search_radii_km": [10, 20] }"#).unwrap();
        assert_eq!(config.search_radii_km, vec![10.0, 20.0]);
        assert_eq!(config.coefficient_tolerance, 1e-5);
        assert_eq!(config.std_threshold(StdVariable::Temperature), Some(0.5));
    }

    #[test]
    fn unordered_radii_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "search_radii_km": [60, 30] }"#).unwrap_err();
        assert!(matches!(err, NaturwbError::Config(_)));

        let err = EngineConfig::from_json_str(r#"{ "search_radii_km": [] }"#).unwrap_err();
        assert!(matches!(err, NaturwbError::Config(_)));
    }
}
