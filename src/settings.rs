use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::renderer::pipeline_cache::DEFAULT_CLEAN_INTERVAL;

/// Knobs of the per-frame prepare pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareSettings {
    /// Frustum-test bounding spheres. Render tasks can still opt out.
    #[serde(default = "PrepareSettings::default_true")]
    pub culling_enabled: bool,
    /// Also cull 2D items whose update area misses the viewport.
    #[serde(default = "PrepareSettings::default_true")]
    pub partial_update_culling: bool,
    /// Reuse last frame's render lists when nothing they depend on moved.
    #[serde(default = "PrepareSettings::default_true")]
    pub reuse_render_lists: bool,
    /// Frames between pipeline cache eviction passes.
    #[serde(default = "PrepareSettings::default_clean_interval")]
    pub pipeline_cache_clean_interval: u32,
    /// Log every render list at debug level after it is built.
    #[serde(default)]
    pub log_render_lists: bool,
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self {
            culling_enabled: true,
            partial_update_culling: true,
            reuse_render_lists: true,
            pipeline_cache_clean_interval: Self::default_clean_interval(),
            log_render_lists: false,
        }
    }
}

impl PrepareSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(settings) => {
                    info!("Loaded prepare settings from {:?}", path);
                    settings
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default prepare settings.",
                        path, err
                    );
                    PrepareSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Prepare settings file {:?} not found. Using default settings.",
                    path
                );
                PrepareSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default prepare settings.",
                    path, err
                );
                PrepareSettings::default()
            }
        }
    }

    /// Parses and validates settings JSON.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let settings: PrepareSettings = serde_json::from_str(contents)?;
        Ok(settings.validate())
    }

    fn validate(mut self) -> Self {
        if self.pipeline_cache_clean_interval == 0 {
            warn!("Pipeline cache clean interval must be greater than zero. Using default value.");
            self.pipeline_cache_clean_interval = Self::default_clean_interval();
        }
        self
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_clean_interval() -> u32 {
        DEFAULT_CLEAN_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings = PrepareSettings::from_json_str(r#"{ "culling_enabled": false }"#).unwrap();
        assert!(!settings.culling_enabled);
        assert!(settings.reuse_render_lists);
        assert_eq!(settings.pipeline_cache_clean_interval, DEFAULT_CLEAN_INTERVAL);
    }

    #[test]
    fn zero_clean_interval_is_replaced() {
        let settings =
            PrepareSettings::from_json_str(r#"{ "pipeline_cache_clean_interval": 0 }"#).unwrap();
        assert_eq!(settings.pipeline_cache_clean_interval, DEFAULT_CLEAN_INTERVAL);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            PrepareSettings::from_json_str("{ not json"),
            Err(crate::error::Error::Settings(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = PrepareSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings, PrepareSettings::default());
    }
}
