// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Provides sensible defaults if the config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::renderer::ClearValues;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Hello Vulkan!".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.01, 0.1, 0.1, 1.0],
            max_frames_in_flight: 2,
        }
    }
}

/// SPIR-V binaries for the simple render system
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/simple_shader.vert.spv"),
            fragment: PathBuf::from("shaders/simple_shader.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub show_fps: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            show_fps: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }

    /// Frames the CPU may record ahead of the GPU, never less than one
    pub fn max_frames_in_flight(&self) -> usize {
        if self.graphics.max_frames_in_flight == 0 {
            log::warn!("max_frames_in_flight = 0 is invalid, using 1");
            return 1;
        }
        self.graphics.max_frames_in_flight
    }

    pub fn clear_values(&self) -> ClearValues {
        ClearValues {
            color: self.graphics.clear_color,
            ..ClearValues::default()
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', using info", self.debug.log_level);
            log::LevelFilter::Info
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_sample_scene() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.max_frames_in_flight, 2);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(
            config.shaders.vertex,
            PathBuf::from("shaders/simple_shader.vert.spv")
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = Config::parse(
            r#"
            [window]
            width = 1024

            [graphics]
            present_mode = "Mailbox"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.graphics.clear_color, [0.01, 0.1, 0.1, 1.0]);
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[graphics]\npresent_mode = \"vsync-ish\"").unwrap();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn zero_frames_in_flight_is_clamped() {
        let config = Config::parse("[graphics]\nmax_frames_in_flight = 0").unwrap();
        assert_eq!(config.max_frames_in_flight(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window\nwidth = 3").is_err());
    }

    #[test]
    fn clear_values_use_configured_color() {
        let config = Config::parse("[graphics]\nclear_color = [1.0, 0.0, 0.0, 1.0]").unwrap();
        let clear = config.clear_values();
        assert_eq!(clear.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(clear.depth, 1.0);
        assert_eq!(clear.stencil, 0);
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        let config = Config::parse("[debug]\nlog_level = \"DEBUG\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
    }
}
