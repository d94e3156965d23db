//! Jog wheel configuration
//!
//! Loaded once at startup from TOML and immutable afterwards. Every field is
//! optional in the file: missing fields come from the selected preset, or from
//! the defaults when no preset is named.
//!
//! ```toml
//! preset = "precise-scrub"
//! max_dynamic_gain = 3.0
//!
//! [[midi.channels]]
//! channel = 1
//! group = "[Channel1]"
//! ```

use crate::controller::decoder::{RelativeEncoding, StepDecoder, MAX_SENSITIVITY};
use crate::controller::midi::MidiConfig;
use crate::engine::ScratchParameters;
use crate::jog::arbiter::ArbitrationPolicy;
use crate::jog::estimator::EstimatorKind;
use crate::jog::scrub::ScrubPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "jogwheel";
const CONFIG_FILE: &str = "config.toml";

/// Env var naming an explicit config file
pub const CONFIG_ENV: &str = "JOGWHEEL_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Historical revisions of the controller mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Scratch only, unit gain, 128 ticks per revolution
    Classic,
    /// Coarse scrubbing with the full speed factor
    FastScrub,
    /// Fine scrubbing, gain only for fast spins
    PreciseScrub,
    /// Heavy platter, very fine scrubbing
    Fine,
}

impl Preset {
    pub fn config(self) -> JogConfig {
        let classic = JogConfig {
            ticks_per_revolution: 128,
            rotation_speed_rpm: 33.0 + 1.0 / 3.0,
            alpha: 1.0 / 8.0,
            beta: 1.0 / 8.0 / 32.0,
            ..JogConfig::default()
        };

        match self {
            Preset::Classic => JogConfig {
                max_dynamic_gain: 1.0,
                arbitration: ArbitrationPolicy::AlwaysInertial,
                ..classic
            },
            Preset::FastScrub => JogConfig {
                max_dynamic_gain: 5.0,
                direct_scrub_gain: 0.005,
                scrub_policy: ScrubPolicy::Undampened,
                ..classic
            },
            Preset::PreciseScrub => JogConfig {
                max_dynamic_gain: 5.0,
                direct_scrub_gain: 0.001,
                scrub_policy: ScrubPolicy::Dampened,
                ..classic
            },
            Preset::Fine => JogConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JogConfig {
    pub ticks_per_revolution: u32,
    pub rotation_speed_rpm: f64,
    /// Scratch filter inertia
    pub alpha: f64,
    /// Scratch filter damping
    pub beta: f64,
    /// Upper bound of the speed factor
    pub max_dynamic_gain: f64,
    /// Position change per unit of scaled step while scrubbing
    pub direct_scrub_gain: f64,
    pub scrub_policy: ScrubPolicy,
    pub arbitration: ArbitrationPolicy,
    pub estimator: EstimatorKind,
    pub encoding: RelativeEncoding,
    pub invert_direction: bool,
    /// Multiplier on every decoded step
    pub sensitivity: u8,
    pub midi: MidiConfig,
}

impl Default for JogConfig {
    fn default() -> Self {
        let alpha = 1.0 / 16.0;
        Self {
            ticks_per_revolution: 96,
            rotation_speed_rpm: 33.0 + 1.0 / 3.0,
            alpha,
            beta: alpha / 64.0,
            max_dynamic_gain: 1.25,
            direct_scrub_gain: 0.0001,
            scrub_policy: ScrubPolicy::Dampened,
            arbitration: ArbitrationPolicy::FollowTransport,
            estimator: EstimatorKind::Windowed,
            encoding: RelativeEncoding::TwosComplement,
            invert_direction: false,
            sensitivity: 1,
            midi: MidiConfig::default(),
        }
    }
}

// On-disk shape: everything optional so a preset can fill the gaps
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    preset: Option<Preset>,
    ticks_per_revolution: Option<u32>,
    rotation_speed_rpm: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    max_dynamic_gain: Option<f64>,
    direct_scrub_gain: Option<f64>,
    scrub_policy: Option<ScrubPolicy>,
    arbitration: Option<ArbitrationPolicy>,
    estimator: Option<EstimatorKind>,
    encoding: Option<RelativeEncoding>,
    invert_direction: Option<bool>,
    sensitivity: Option<u8>,
    midi: Option<MidiConfig>,
}

impl ConfigFile {
    fn resolve(self) -> JogConfig {
        let base = self.preset.map(Preset::config).unwrap_or_default();
        JogConfig {
            ticks_per_revolution: self.ticks_per_revolution.unwrap_or(base.ticks_per_revolution),
            rotation_speed_rpm: self.rotation_speed_rpm.unwrap_or(base.rotation_speed_rpm),
            alpha: self.alpha.unwrap_or(base.alpha),
            beta: self.beta.unwrap_or(base.beta),
            max_dynamic_gain: self.max_dynamic_gain.unwrap_or(base.max_dynamic_gain),
            direct_scrub_gain: self.direct_scrub_gain.unwrap_or(base.direct_scrub_gain),
            scrub_policy: self.scrub_policy.unwrap_or(base.scrub_policy),
            arbitration: self.arbitration.unwrap_or(base.arbitration),
            estimator: self.estimator.unwrap_or(base.estimator),
            encoding: self.encoding.unwrap_or(base.encoding),
            invert_direction: self.invert_direction.unwrap_or(base.invert_direction),
            sensitivity: self.sensitivity.unwrap_or(base.sensitivity),
            midi: self.midi.unwrap_or(base.midi),
        }
    }
}

impl JogConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        if let Some(preset) = file.preset {
            debug!("Config based on preset {:?}", preset);
        }
        file.resolve().validated()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded jog wheel config from {}", path.display());
        Ok(config)
    }

    /// Like [`JogConfig::load`], but a missing file yields the defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            Self::load(path).await
        } else {
            warn!("Config file {} does not exist, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Writes the defaults to `path` unless a file is already there.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if tokio::fs::try_exists(path).await.map_err(io_err)? {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, Self::default().to_toml_string()?)
            .await
            .map_err(io_err)?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    /// `<config dir>/jogwheel/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut dir| {
            dir.push(CONFIG_DIR);
            dir.push(CONFIG_FILE);
            dir
        })
    }

    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.ticks_per_revolution == 0 {
            return Err(invalid("ticks_per_revolution", "must be positive"));
        }
        if !self.rotation_speed_rpm.is_finite() || self.rotation_speed_rpm <= 0.0 {
            return Err(invalid("rotation_speed_rpm", "must be a positive number"));
        }
        for (field, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(field, "must be in (0, 1]"));
            }
        }
        if !self.max_dynamic_gain.is_finite() {
            return Err(invalid("max_dynamic_gain", "must be finite"));
        }
        if !self.direct_scrub_gain.is_finite() {
            return Err(invalid("direct_scrub_gain", "must be finite"));
        }
        if !(1..=MAX_SENSITIVITY).contains(&self.sensitivity) {
            return Err(invalid("sensitivity", "must be in 1..=16"));
        }
        if self.max_dynamic_gain < 1.0 {
            warn!(
                "max_dynamic_gain {} is below 1, clamping to 1",
                self.max_dynamic_gain
            );
            self.max_dynamic_gain = 1.0;
        }
        Ok(self)
    }

    pub fn scratch_parameters(&self) -> ScratchParameters {
        ScratchParameters {
            ticks_per_revolution: self.ticks_per_revolution,
            rotation_speed_rpm: self.rotation_speed_rpm,
            alpha: self.alpha,
            beta: self.beta,
        }
    }

    pub fn step_decoder(&self) -> StepDecoder {
        StepDecoder::new(self.encoding, self.invert_direction).with_sensitivity(self.sensitivity)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_final_mapping() {
        let config = JogConfig::default();
        assert_eq!(config.ticks_per_revolution, 96);
        assert_eq!(config.alpha, 0.0625);
        assert_eq!(config.beta, 0.0625 / 64.0);
        assert_eq!(config.max_dynamic_gain, 1.25);
        assert_eq!(config.direct_scrub_gain, 0.0001);
        assert_eq!(config.scrub_policy, ScrubPolicy::Dampened);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(JogConfig::from_toml_str("").unwrap(), JogConfig::default());
    }

    #[test]
    fn preset_fields_can_be_overridden() {
        let config = JogConfig::from_toml_str(
            r#"
            preset = "precise-scrub"
            max_dynamic_gain = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(config.ticks_per_revolution, 128);
        assert_eq!(config.direct_scrub_gain, 0.001);
        assert_eq!(config.max_dynamic_gain, 3.0);
    }

    #[test]
    fn classic_preset_always_scratches() {
        let config = JogConfig::from_toml_str(r#"preset = "classic""#).unwrap();
        assert_eq!(config.arbitration, ArbitrationPolicy::AlwaysInertial);
        assert_eq!(config.max_dynamic_gain, 1.0);
    }

    #[test]
    fn fast_scrub_uses_superseded_policy() {
        let config = Preset::FastScrub.config();
        assert_eq!(config.scrub_policy, ScrubPolicy::Undampened);
        assert_eq!(config.direct_scrub_gain, 0.005);
    }

    #[test]
    fn channel_routing_parses() {
        let config = JogConfig::from_toml_str(
            r#"
            encoding = "binary-offset"

            [[midi.channels]]
            channel = 3
            group = "[Channel2]"
            "#,
        )
        .unwrap();
        assert_eq!(config.encoding, RelativeEncoding::BinaryOffset);
        assert_eq!(config.midi.group_for(3), Some("[Channel2]"));
        assert_eq!(config.midi.group_for(1), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            JogConfig::from_toml_str("tick_per_rev = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_ticks_rejected() {
        assert!(matches!(
            JogConfig::from_toml_str("ticks_per_revolution = 0"),
            Err(ConfigError::Invalid {
                field: "ticks_per_revolution",
                ..
            })
        ));
    }

    #[test]
    fn alpha_out_of_range_rejected() {
        assert!(matches!(
            JogConfig::from_toml_str("alpha = 1.5"),
            Err(ConfigError::Invalid { field: "alpha", .. })
        ));
    }

    #[test]
    fn sensitivity_feeds_the_decoder() {
        let config = JogConfig::from_toml_str(
            r#"
            encoding = "binary-offset"
            invert_direction = true
            sensitivity = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.step_decoder().decode(65), -2);
    }

    #[test]
    fn zero_sensitivity_rejected() {
        assert!(matches!(
            JogConfig::from_toml_str("sensitivity = 0"),
            Err(ConfigError::Invalid {
                field: "sensitivity",
                ..
            })
        ));
    }

    #[test]
    fn gain_below_one_is_clamped() {
        let config = JogConfig::from_toml_str("max_dynamic_gain = 0.5").unwrap();
        assert_eq!(config.max_dynamic_gain, 1.0);
    }

    #[test]
    fn serialized_defaults_load_back() {
        let text = JogConfig::default().to_toml_string().unwrap();
        assert_eq!(JogConfig::from_toml_str(&text).unwrap(), JogConfig::default());
    }
}
