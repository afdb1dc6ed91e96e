//! Renderer configuration, loadable from TOML.
//!
//! ```toml
//! width = 640
//! height = 400
//! fov_degrees = 90.0
//! resource_mode = "tolerant"
//! sky_flat = "F_SKY1"
//! sky_texture = "SKY1"
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::world::{ResourceBank, ResourceError, ResourceMode};

pub const MIN_WIDTH: usize = 32;
pub const MAX_WIDTH: usize = 4096;
pub const MIN_HEIGHT: usize = 20;
pub const MAX_HEIGHT: usize = 2048;
pub const MIN_FOV: f32 = 30.0;
pub const MAX_FOV: f32 = 120.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    /// Horizontal field of view.
    pub fov_degrees: f32,
    pub resource_mode: ResourceMode,
    /// Flat that marks a sky ceiling.
    pub sky_flat: Option<String>,
    /// Texture drawn where the sky flat is.
    pub sky_texture: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 200,
            fov_degrees: 90.0,
            resource_mode: ResourceMode::Strict,
            sky_flat: None,
            sky_texture: None,
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&self.width) {
            return Err(ConfigError::Invalid(format!(
                "width {} outside {MIN_WIDTH}..={MAX_WIDTH}",
                self.width
            )));
        }
        if !(MIN_HEIGHT..=MAX_HEIGHT).contains(&self.height) {
            return Err(ConfigError::Invalid(format!(
                "height {} outside {MIN_HEIGHT}..={MAX_HEIGHT}",
                self.height
            )));
        }
        if !(MIN_FOV..=MAX_FOV).contains(&self.fov_degrees) {
            return Err(ConfigError::Invalid(format!(
                "fov {} outside {MIN_FOV}..={MAX_FOV} degrees",
                self.fov_degrees
            )));
        }
        if self.sky_flat.is_some() != self.sky_texture.is_some() {
            return Err(ConfigError::Invalid(
                "sky_flat and sky_texture must be given together".into(),
            ));
        }
        Ok(())
    }

    /// Point the bank's sky at the configured flat and texture, if any.
    pub fn apply_sky(&self, bank: &mut ResourceBank) -> Result<(), ResourceError> {
        match (&self.sky_flat, &self.sky_texture) {
            (Some(flat), Some(texture)) => bank.configure_sky(flat, texture),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RenderConfig::default());
        assert_eq!((cfg.width, cfg.height), (320, 200));
    }

    #[test]
    fn fields_parse() {
        let cfg = RenderConfig::from_toml_str(
            r#"
            width = 640
            height = 400
            fov_degrees = 75.5
            resource_mode = "tolerant"
            sky_flat = "F_SKY1"
            sky_texture = "SKY1"
            "#,
        )
        .unwrap();
        assert_eq!((cfg.width, cfg.height), (640, 400));
        assert_eq!(cfg.fov_degrees, 75.5);
        assert_eq!(cfg.resource_mode, ResourceMode::Tolerant);
        assert_eq!(cfg.sky_texture.as_deref(), Some("SKY1"));
    }

    #[test]
    fn bad_documents_are_rejected() {
        assert!(matches!(
            RenderConfig::from_toml_str("width = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RenderConfig::from_toml_str("colour = true"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RenderConfig::from_toml_str("width = 8"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RenderConfig::from_toml_str("fov_degrees = 170.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RenderConfig::from_toml_str("sky_flat = \"F_SKY1\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            RenderConfig::from_file("/nonexistent/yadoom.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn sky_names_reach_the_bank() {
        let mut bank = crate::world::demo::demo_bank(ResourceMode::Strict).unwrap();
        let cfg = RenderConfig {
            sky_flat: Some("CEIL".into()),
            sky_texture: Some("STONE".into()),
            ..RenderConfig::default()
        };
        cfg.apply_sky(&mut bank).unwrap();
        assert!(bank.is_sky(bank.flat_id("CEIL").unwrap()));
    }
}
