use crate::error::ConfigError;
use crate::frame::{ColorRange, Hsv};
use crate::geometry::Margins;
use crate::vision::{MatcherConfig, SegmentationMode};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the loop treats detections of a category when ordering clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryRole {
    /// Clicked before any target in the same frame
    Hazard,
    Target,
}

/// One kind of clickable object: its colours and the smallest blob worth clicking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCategory {
    pub name: String,
    pub role: CategoryRole,
    pub ranges: Vec<ColorRange>,
    /// Regions with area at or below this are ignored
    pub min_area: u64,
}

/// Colour-range-to-category mapping for one flavour of the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameVariant {
    pub name: String,
    pub categories: Vec<DetectionCategory>,
}

const STAR: ColorRange = ColorRange {
    lower: Hsv::new(32, 65, 100),
    upper: Hsv::new(56, 255, 255),
};

const ICE: ColorRange = ColorRange {
    lower: Hsv::new(45, 0, 215),
    upper: Hsv::new(105, 165, 255),
};

const BOMB: ColorRange = ColorRange {
    lower: Hsv::new(0, 0, 140),
    upper: Hsv::new(180, 36, 255),
};

impl GameVariant {
    /// Regular rounds: green stars only
    pub fn stars() -> Self {
        Self {
            name: "stars".to_string(),
            categories: vec![DetectionCategory {
                name: "star".to_string(),
                role: CategoryRole::Target,
                ranges: vec![STAR],
                min_area: 200,
            }],
        }
    }

    /// Event rounds where ice cubes freeze the timer
    pub fn stars_and_ice() -> Self {
        let mut variant = Self::stars();
        variant.name = "stars_and_ice".to_string();
        variant.categories.push(DetectionCategory {
            name: "ice".to_string(),
            role: CategoryRole::Target,
            ranges: vec![ICE],
            min_area: 200,
        });
        variant
    }

    /// Stars plus grey bombs as a hazard category, clicked before the stars
    pub fn stars_and_bombs() -> Self {
        let mut variant = Self::stars();
        variant.name = "stars_and_bombs".to_string();
        variant.categories.push(DetectionCategory {
            name: "bomb".to_string(),
            role: CategoryRole::Hazard,
            ranges: vec![BOMB],
            min_area: 150,
        });
        variant
    }

    /// Categories in click order: hazards first, then targets, each group
    /// in configured order.
    pub fn dispatch_order(&self) -> Vec<&DetectionCategory> {
        let hazards = self
            .categories
            .iter()
            .filter(|c| c.role == CategoryRole::Hazard);
        let targets = self
            .categories
            .iter()
            .filter(|c| c.role == CategoryRole::Target);
        hazards.chain(targets).collect()
    }
}

impl Default for GameVariant {
    fn default() -> Self {
        Self::stars()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the reference images, relative to the config directory
    /// or the working directory
    pub template_dir: String,

    /// Game window template file name
    pub anchor_template: String,

    /// Start ("play") button template file name
    pub start_template: String,

    /// Round-end ("play again") button template file name
    pub round_end_template: String,

    /// Minimum similarity (0.0-1.0) for each template to count as found
    pub anchor_similarity: f64,
    pub start_similarity: f64,
    pub round_end_similarity: f64,

    /// Trimmed off the game window to get the area where objects fall
    pub play_area_margins: Margins,

    /// How long to wait for operator activity after a round ends
    pub activity_timeout_ms: u64,

    /// Pause after clicking "play again" so the next round can render
    pub resume_delay_ms: u64,

    pub segmentation_mode: SegmentationMode,

    pub matcher: MatcherConfig,

    pub variant: GameVariant,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_dir: "img".to_string(),
            anchor_template: "blum_window.png".to_string(),
            start_template: "play.png".to_string(),
            round_end_template: "replay.png".to_string(),
            anchor_similarity: 0.8,
            start_similarity: 0.9,
            round_end_similarity: 0.9,
            play_area_margins: Margins {
                left: 0,
                top: 120,
                right: 0,
                bottom: 500,
            },
            activity_timeout_ms: 1000,
            resume_delay_ms: 500,
            segmentation_mode: SegmentationMode::Combined,
            matcher: MatcherConfig::default(),
            variant: GameVariant::stars(),
        }
    }
}

impl Config {
    /// Load configuration from the app's config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, writing defaults there when it is absent
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;

            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            tracing::info!("Edit this file to customize settings.");
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let fail = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| fail(Box::new(e)))?;
        fs::write(path, json).map_err(|e| fail(Box::new(e)))?;

        Ok(())
    }

    /// Get the config file path (in app's base directory)
    fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn config_dir() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "<executable>".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("Could not determine executable directory".into()))?;

        Ok(exe_dir.join("config"))
    }

    /// Get the config file path (for display purposes)
    pub fn config_path_display() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Resolve the template directory.
    ///
    /// Absolute paths are used as-is. Relative ones are tried against the
    /// config directory first, then the working directory.
    pub fn template_dir_path(&self) -> PathBuf {
        let dir = Path::new(&self.template_dir);
        if dir.is_absolute() {
            return dir.to_path_buf();
        }

        if let Ok(config_dir) = Self::config_dir() {
            let candidate = config_dir.join(dir);
            if candidate.is_dir() {
                return candidate;
            }
        }
        dir.to_path_buf()
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("anchor_similarity", self.anchor_similarity),
            ("start_similarity", self.start_similarity),
            ("round_end_similarity", self.round_end_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.activity_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "activity_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.variant.categories.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "game variant '{}' has no detection categories",
                self.variant.name
            )));
        }

        for category in &self.variant.categories {
            if category.ranges.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has no colour ranges",
                    category.name
                )));
            }
            if let Some(range) = category.ranges.iter().find(|r| !r.is_valid()) {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has an inverted colour range {:?}",
                    category.name, range
                )));
            }
        }

        Ok(())
    }
}
