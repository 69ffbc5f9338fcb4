use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use well_core::{QualityThresholds, SchedulerConfig};

/// Upper bound for every `*_secs` setting.
const MAX_SECS: u64 = 24 * 3600;
const MAX_BACKOFF_MULTIPLIER: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Daemon configuration: defaults, then an optional TOML file, then `WELL_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory holding the ONNX models.
    pub model_dir: PathBuf,
    /// SQLite database with persons and readings.
    pub db_path: PathBuf,
    /// File caching this machine's person id.
    pub identity_file: PathBuf,
    /// Maximum cosine distance for two embeddings to be the same person.
    pub similarity_threshold: f32,
    pub brightness_min: f32,
    pub sharpness_min: f32,
    pub contrast_min: f32,
    pub base_interval_secs: u64,
    pub max_interval_secs: u64,
    pub backoff_multiplier: u32,
    pub cooldown_secs: u64,
    pub bad_streak_limit: u32,
    pub streak_hold_secs: u64,
    pub cpu_high_threshold: f32,
    /// Seconds without pointer movement before the user counts as away.
    pub idle_timeout_secs: u64,
    /// Upper bound on any single camera, inference or store call.
    pub call_timeout_secs: u64,
    /// Frames discarded per capture while auto-exposure settles.
    pub warmup_frames: usize,
    /// Skip captures under load, after absences and during bad streaks.
    pub economy: bool,
}

/// TOML file layer; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLayer {
    camera_device: Option<String>,
    model_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    identity_file: Option<PathBuf>,
    similarity_threshold: Option<f32>,
    brightness_min: Option<f32>,
    sharpness_min: Option<f32>,
    contrast_min: Option<f32>,
    base_interval_secs: Option<u64>,
    max_interval_secs: Option<u64>,
    backoff_multiplier: Option<u32>,
    cooldown_secs: Option<u64>,
    bad_streak_limit: Option<u32>,
    streak_hold_secs: Option<u64>,
    cpu_high_threshold: Option<f32>,
    idle_timeout_secs: Option<u64>,
    call_timeout_secs: Option<u64>,
    warmup_frames: Option<usize>,
    economy: Option<bool>,
}

/// Apply `Some` values from a layer onto the config.
macro_rules! overlay {
    ($config:expr, $layer:expr, [$($field:ident),* $(,)?]) => {
        $(if let Some(v) = $layer.$field {
            $config.$field = v;
        })*
    };
}

/// Read `WELL_<FIELD>` for each field through `$lookup`.
macro_rules! env_layer {
    ($lookup:expr, [$($field:ident),* $(,)?]) => {{
        let mut layer = FileLayer::default();
        $(layer.$field = env_parse($lookup, &env_key(stringify!($field)))?;)*
        layer
    }};
}

fn env_key(field: &str) -> String {
    format!("WELL_{}", field.to_ascii_uppercase())
}

/// Values that can come from an environment variable.
trait EnvValue: Sized {
    fn parse_env(raw: &str) -> Option<Self>;
}

macro_rules! env_value_from_str {
    ($($ty:ty),*) => {
        $(impl EnvValue for $ty {
            fn parse_env(raw: &str) -> Option<Self> {
                <$ty as FromStr>::from_str(raw.trim()).ok()
            }
        })*
    };
}

env_value_from_str!(String, PathBuf, f32, u32, u64, usize);

impl EnvValue for bool {
    fn parse_env(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

fn env_parse<T: EnvValue>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    T::parse_env(&raw).map(Some).ok_or_else(|| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw,
    })
}

impl Config {
    /// Built-in defaults. Paths follow `HOME` and `XDG_DATA_HOME`.
    pub fn defaults(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let home = PathBuf::from(lookup("HOME").unwrap_or_else(|| "/tmp".to_string()));
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/share"))
            .join("well");

        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: well_models::default_model_dir(),
            db_path: data_dir.join("well.db"),
            identity_file: home.join(".well").join("person_id"),
            similarity_threshold: well_core::DEFAULT_SIMILARITY_THRESHOLD,
            brightness_min: 30.0,
            sharpness_min: 30.0,
            contrast_min: 15.0,
            base_interval_secs: 10,
            max_interval_secs: 60,
            backoff_multiplier: 3,
            cooldown_secs: 120,
            bad_streak_limit: 3,
            streak_hold_secs: 360,
            cpu_high_threshold: 80.0,
            idle_timeout_secs: 60,
            call_timeout_secs: 15,
            warmup_frames: 3,
            economy: true,
        }
    }

    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&|key| std::env::var(key).ok())
    }

    /// Load with an explicit variable lookup.
    pub fn load_with(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(lookup);

        if let Some(path) = Self::file_path(lookup) {
            let file = read_file_layer(&path)?;
            tracing::debug!(path = %path.display(), "loaded config file");
            config.apply(file);
        }

        let env = env_layer!(lookup, [
            camera_device, model_dir, db_path, identity_file, similarity_threshold,
            brightness_min, sharpness_min, contrast_min, base_interval_secs,
            max_interval_secs, backoff_multiplier, cooldown_secs, bad_streak_limit,
            streak_hold_secs, cpu_high_threshold, idle_timeout_secs, call_timeout_secs,
            warmup_frames, economy,
        ]);
        config.apply(env);

        config.validate()?;
        Ok(config)
    }

    /// `WELL_CONFIG` if set, else the XDG config file when it exists.
    fn file_path(lookup: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(explicit) = lookup("WELL_CONFIG") {
            return Some(PathBuf::from(explicit));
        }
        let config_home = lookup("XDG_CONFIG_HOME").map(PathBuf::from).or_else(|| {
            lookup("HOME").map(|home| PathBuf::from(home).join(".config"))
        })?;
        let path = config_home.join("well").join("welld.toml");
        path.exists().then_some(path)
    }

    fn apply(&mut self, layer: FileLayer) {
        overlay!(self, layer, [
            camera_device, model_dir, db_path, identity_file, similarity_threshold,
            brightness_min, sharpness_min, contrast_min, base_interval_secs,
            max_interval_secs, backoff_multiplier, cooldown_secs, bad_streak_limit,
            streak_hold_secs, cpu_high_threshold, idle_timeout_secs, call_timeout_secs,
            warmup_frames, economy,
        ]);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.base_interval_secs == 0 {
            return invalid("base_interval_secs must be at least 1".into());
        }
        if self.max_interval_secs < self.base_interval_secs {
            return invalid(format!(
                "max_interval_secs ({}) is below base_interval_secs ({})",
                self.max_interval_secs, self.base_interval_secs
            ));
        }
        for (name, value) in [
            ("base_interval_secs", self.base_interval_secs),
            ("max_interval_secs", self.max_interval_secs),
            ("cooldown_secs", self.cooldown_secs),
            ("streak_hold_secs", self.streak_hold_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("call_timeout_secs", self.call_timeout_secs),
        ] {
            if value > MAX_SECS {
                return invalid(format!("{name} {value} exceeds {MAX_SECS}"));
            }
        }
        if !(1..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff_multiplier) {
            return invalid(format!(
                "backoff_multiplier {} outside 1..={MAX_BACKOFF_MULTIPLIER}",
                self.backoff_multiplier
            ));
        }
        if self.bad_streak_limit == 0 {
            return invalid("bad_streak_limit must be at least 1".into());
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 2.0) {
            return invalid(format!(
                "similarity_threshold {} outside (0, 2]",
                self.similarity_threshold
            ));
        }
        for (name, value) in [
            ("brightness_min", self.brightness_min),
            ("sharpness_min", self.sharpness_min),
            ("contrast_min", self.contrast_min),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if !(self.cpu_high_threshold > 0.0 && self.cpu_high_threshold <= 100.0) {
            return invalid(format!(
                "cpu_high_threshold {} outside (0, 100]",
                self.cpu_high_threshold
            ));
        }
        if self.call_timeout_secs == 0 {
            return invalid("call_timeout_secs must be at least 1".into());
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            base_interval: Duration::from_secs(self.base_interval_secs),
            max_interval: Duration::from_secs(self.max_interval_secs),
            backoff_multiplier: self.backoff_multiplier,
            cooldown: Duration::from_secs(self.cooldown_secs),
            bad_streak_limit: self.bad_streak_limit,
            streak_hold: Duration::from_secs(self.streak_hold_secs),
            cpu_high_threshold: self.cpu_high_threshold,
            similarity_threshold: self.similarity_threshold,
            economy: self.economy,
        }
    }

    pub fn quality(&self) -> QualityThresholds {
        QualityThresholds {
            brightness_min: self.brightness_min,
            sharpness_min: self.sharpness_min,
            contrast_min: self.contrast_min,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn read_file_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
