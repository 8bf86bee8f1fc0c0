use crate::loop_points::LabelResolution;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Settings file looked up in the current directory before the user config dir.
pub const LOCAL_CONFIG_FILE: &str = "brstmgen.json";
const APP_DIR_NAME: &str = "BRSTMGen";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("Pipe path not configured: {0}")]
    MissingPipePath(&'static str),
    #[error("Scratch directory {} would overlap the working or output directory", .0.display())]
    UnsafeScratchDir(PathBuf),
}

/// Generator settings. Every field falls back to its default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub sample_rate: u32,
    pub final_lap: FinalLapSettings,
    pub verbose: bool,
    pub export_channels: u32,
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub tools: ToolPaths,
    pub pipes: PipeSettings,
    pub label_resolution: LabelResolution,
}

/// Pitch/tempo-shifted "final lap" variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalLapSettings {
    pub enabled: bool,
    pub pitch_semitones: f64,
    pub tempo_ratio: f64,
}

/// External converter executables, resolved through PATH when relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolPaths {
    pub vgaudio: PathBuf,
    pub looping_audio_converter: PathBuf,
}

/// Named pipes exposed by the editor's scripting module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipeSettings {
    pub to_editor: PathBuf,
    pub from_editor: PathBuf,
    pub eol: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32000,
            final_lap: FinalLapSettings::default(),
            verbose: false,
            export_channels: 2,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: PathBuf::from("output"),
            scratch_dir: PathBuf::from("tmp"),
            tools: ToolPaths::default(),
            pipes: PipeSettings::default(),
            label_resolution: LabelResolution::default(),
        }
    }
}

impl Default for FinalLapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pitch_semitones: 2.0,
            tempo_ratio: 1.1,
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        let vgaudio = if cfg!(windows) {
            "VGAudioCli.exe"
        } else {
            "VGAudioCli"
        };
        Self {
            vgaudio: PathBuf::from(vgaudio),
            looping_audio_converter: PathBuf::from("LoopingAudioConverter"),
        }
    }
}

#[cfg(windows)]
impl Default for PipeSettings {
    fn default() -> Self {
        use crate::ipc::{EOL, FROM_PIPE_NAME, TO_PIPE_NAME};
        Self {
            to_editor: PathBuf::from(TO_PIPE_NAME),
            from_editor: PathBuf::from(FROM_PIPE_NAME),
            eol: EOL.to_string(),
        }
    }
}

/// The editor suffixes its pipes with the real uid of the user running it.
/// When the generator runs as a different user (sudo, a service account),
/// set `pipes.toEditor` and `pipes.fromEditor` explicitly.
#[cfg(not(windows))]
impl Default for PipeSettings {
    fn default() -> Self {
        use crate::ipc::{EOL, FROM_PIPE_PREFIX, TO_PIPE_PREFIX};

        let uid = unsafe { libc::getuid() };
        Self {
            to_editor: PathBuf::from(format!("{}{}", TO_PIPE_PREFIX, uid)),
            from_editor: PathBuf::from(format!("{}{}", FROM_PIPE_PREFIX, uid)),
            eol: EOL.to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Load settings from `brstmgen.json` in the current directory, then from
    /// the user config directory, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(user) = user_config_path() {
            if user.exists() {
                return Self::load_from(&user);
            }
        }

        info!("[CONFIG] No settings file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load settings from an explicit JSON file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        info!("[CONFIG] Loaded settings from {}", path.display());
        debug!("[CONFIG] {:?}", config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if self.pipes.to_editor.as_os_str().is_empty() {
            return Err(ConfigError::MissingPipePath("toEditor"));
        }
        if self.pipes.from_editor.as_os_str().is_empty() {
            return Err(ConfigError::MissingPipePath("fromEditor"));
        }
        self.validate_scratch_dir()
    }

    /// The scratch directory is deleted after every final lap conversion, so
    /// it must be a dedicated subdirectory that holds neither the working nor
    /// the output directory.
    fn validate_scratch_dir(&self) -> Result<(), ConfigError> {
        let unsafe_dir = || ConfigError::UnsafeScratchDir(self.scratch_dir.clone());

        let mut has_name = false;
        for component in self.scratch_dir.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::ParentDir => return Err(unsafe_dir()),
                _ => {}
            }
        }
        if !has_name {
            return Err(unsafe_dir());
        }

        let scratch = self.scratch_path();
        if self.working_dir.starts_with(&scratch) || self.output_path().starts_with(&scratch) {
            return Err(unsafe_dir());
        }
        Ok(())
    }

    /// Directory holding the final BRSTM files.
    pub fn output_path(&self) -> PathBuf {
        self.working_dir.join(&self.output_dir)
    }

    /// Scratch directory used by the final lap conversion.
    pub fn scratch_path(&self) -> PathBuf {
        self.working_dir.join(&self.scratch_dir)
    }

    /// Export target for the track at `index` in the editor's track list.
    pub fn export_path(&self, index: usize) -> PathBuf {
        self.working_dir.join(format!("{}.wav", index))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.json"))
}
