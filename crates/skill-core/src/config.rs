//! Engine configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration. Environment variables override file values.

use crate::error::{Result, SkillTreeError};
use serde::{Deserialize, Serialize};
use skill_graph::{LayoutConfig, LayoutEngine, UnlockEngine, UNLOCK_THRESHOLD_PERCENT};
use std::fs;
use std::path::Path;

/// Overrides `exp_increment`
pub const ENV_EXP_INCREMENT: &str = "SKILLTREE_EXP_INCREMENT";
/// Overrides `unlock_threshold_percent`
pub const ENV_UNLOCK_THRESHOLD: &str = "SKILLTREE_UNLOCK_THRESHOLD";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EXP added per increment
    pub exp_increment: u32,
    /// Required EXP of proposed nodes that omit it
    pub default_required_exp: u32,
    /// Parent progress (percent) that unlocks children
    pub unlock_threshold_percent: f64,
    /// Label of the center node created during onboarding
    pub center_label: String,
    /// Layout tuning
    pub layout: LayoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exp_increment: 10,
            default_required_exp: 100,
            unlock_threshold_percent: UNLOCK_THRESHOLD_PERCENT,
            center_label: "You".to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With EXP increment
    #[inline]
    #[must_use]
    pub fn with_exp_increment(mut self, exp: u32) -> Self {
        self.exp_increment = exp;
        self
    }

    /// With default required EXP
    #[inline]
    #[must_use]
    pub fn with_default_required_exp(mut self, exp: u32) -> Self {
        self.default_required_exp = exp;
        self
    }

    /// With unlock threshold
    #[inline]
    #[must_use]
    pub fn with_unlock_threshold(mut self, percent: f64) -> Self {
        self.unlock_threshold_percent = percent;
        self
    }

    /// With center label
    #[inline]
    #[must_use]
    pub fn with_center_label(mut self, label: impl Into<String>) -> Self {
        self.center_label = label.into();
        self
    }

    /// With layout tuning
    #[inline]
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Parse TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| SkillTreeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SkillTreeError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&contents)
            .map_err(|e| SkillTreeError::Config(format!("{}: {e}", path.display())))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `SKILLTREE_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_EXP_INCREMENT) {
            self.exp_increment = raw
                .parse()
                .map_err(|e| SkillTreeError::Config(format!("{ENV_EXP_INCREMENT}={raw}: {e}")))?;
        }
        if let Ok(raw) = std::env::var(ENV_UNLOCK_THRESHOLD) {
            self.unlock_threshold_percent = raw
                .parse()
                .map_err(|e| SkillTreeError::Config(format!("{ENV_UNLOCK_THRESHOLD}={raw}: {e}")))?;
        }
        self.validate()
    }

    /// Reject values the engines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.exp_increment == 0 {
            return Err(SkillTreeError::Config("exp_increment must be positive".into()));
        }
        if !(0.0..=100.0).contains(&self.unlock_threshold_percent) {
            return Err(SkillTreeError::Config(format!(
                "unlock_threshold_percent out of range: {}",
                self.unlock_threshold_percent
            )));
        }
        let layout = &self.layout;
        let finite = [
            layout.base_radius,
            layout.radius_increment,
            layout.subtree_radius_factor,
            layout.min_node_distance,
            layout.push_strength,
            layout.grid_spacing,
            layout.fallback_sibling_spread,
        ];
        if finite.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SkillTreeError::Config("layout values must be finite and non-negative".into()));
        }
        Ok(())
    }

    /// Unlock engine using the configured threshold
    #[must_use]
    pub fn unlock_engine(&self) -> UnlockEngine {
        UnlockEngine::new().with_threshold(self.unlock_threshold_percent)
    }

    /// Layout engine using the configured tuning
    #[must_use]
    pub fn layout_engine(&self) -> LayoutEngine {
        LayoutEngine::new(self.layout.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            exp_increment = 25
            center_label = "Me"

            [layout]
            min_node_distance = 150.0
            relaxation_iterations = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.exp_increment, 25);
        assert_eq!(config.center_label, "Me");
        assert_eq!(config.default_required_exp, 100);
        assert!((config.layout.min_node_distance - 150.0).abs() < f64::EPSILON);
        assert_eq!(config.layout.relaxation_iterations, 10);
        assert!((config.layout.base_radius - 350.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(EngineConfig::from_toml_str("exp_increment = 0").is_err());
        assert!(EngineConfig::from_toml_str("unlock_threshold_percent = 150.0").is_err());
        assert!(EngineConfig::from_toml_str("exp_increment = \"ten\"").is_err());
    }

    #[test]
    fn load_reads_file_and_names_it_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("skilltree.toml");
        fs::write(&good, "default_required_exp = 60\n").unwrap();
        assert_eq!(EngineConfig::load(&good).unwrap().default_required_exp, 60);

        let bad = dir.path().join("broken.toml");
        fs::write(&bad, "layout = 3\n").unwrap();
        let err = EngineConfig::load(&bad).unwrap_err();
        assert!(matches!(err, SkillTreeError::Config(ref msg) if msg.contains("broken.toml")));

        assert!(EngineConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn builders_chain() {
        let config = EngineConfig::new()
            .with_exp_increment(5)
            .with_unlock_threshold(75.0)
            .with_center_label("Center");
        assert_eq!(config.exp_increment, 5);
        assert!((config.unlock_engine().threshold_percent() - 75.0).abs() < f64::EPSILON);
    }
}
