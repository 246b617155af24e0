use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub visuals: VisualsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where the player fetches random picks and streams from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Attempts per fetch chain, counting the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// What happens to the last track's metadata after an explicit stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataOnStop {
    /// Leave the last played track on screen.
    #[default]
    Keep,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default)]
    pub metadata_on_stop: MetadataOnStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualsConfig {
    /// Show the visualizer overlay at startup.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_blend_secs")]
    pub preset_blend_secs: f32,
    /// PCM samples shown per frame.
    #[serde(default = "default_samples")]
    pub samples: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Anything longer than this is a mix, the rest are tunes.
    #[serde(default = "default_mix_threshold_secs")]
    pub mix_threshold_secs: u64,
    /// Files longer than this are not indexed at all.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Issued play ids kept resolvable for streaming.
    #[serde(default = "default_max_live_plays")]
    pub max_live_plays: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted filter selection.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            metadata_on_stop: MetadataOnStop::default(),
        }
    }
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fps: default_fps(),
            preset_blend_secs: default_blend_secs(),
            samples: default_samples(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            library_dir: default_library_dir(),
            extensions: default_extensions(),
            mix_threshold_secs: default_mix_threshold_secs(),
            max_duration_secs: default_max_duration_secs(),
            max_live_plays: default_max_live_plays(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

pub const PRODUCTION_BASE_URL: &str = "https://randomsound.uk/";
pub const DEV_BASE_URL: &str = "http://localhost:1337/";

fn default_base_url() -> String {
    PRODUCTION_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_volume() -> f32 {
    0.5
}

fn default_fps() -> u32 {
    30
}

fn default_blend_secs() -> f32 {
    1.0
}

/// Longest preset crossfade accepted from the config file.
pub const MAX_BLEND_SECS: f32 = 30.0;

impl VisualsConfig {
    /// Crossfade length clamped to `0..=MAX_BLEND_SECS`; NaN falls back to
    /// the default.
    pub fn blend_secs(&self) -> f32 {
        if self.preset_blend_secs.is_nan() {
            default_blend_secs()
        } else {
            self.preset_blend_secs.clamp(0.0, MAX_BLEND_SECS)
        }
    }
}

fn default_samples() -> u32 {
    2048
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1337
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("./files")
}

fn default_extensions() -> Vec<String> {
    vec!["flac".to_string(), "wav".to_string(), "mp3".to_string()]
}

fn default_mix_threshold_secs() -> u64 {
    23 * 60
}

fn default_max_duration_secs() -> u64 {
    12000
}

fn default_max_live_plays() -> usize {
    4096
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("filters.json")
}

impl Config {
    /// Load the config at the default location, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &std::path::Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.visuals.preset_blend_secs = config.visuals.blend_secs();
        Ok(config)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://randomsound.uk/");
        assert_eq!(config.api.max_attempts, 3);
        assert_eq!(config.player.metadata_on_stop, MetadataOnStop::Keep);
        assert_eq!(config.server.port, 1337);
        assert_eq!(config.server.mix_threshold_secs, 1380);
        assert!(config.paths.state_file.ends_with("randomsound/filters.json"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "http://localhost:1337/"

            [player]
            metadata_on_stop = "clear"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, DEV_BASE_URL);
        assert_eq!(config.api.request_timeout_ms, 5000);
        assert_eq!(config.player.metadata_on_stop, MetadataOnStop::Clear);
        assert_eq!(config.visuals.fps, 30);
        assert_eq!(config.server.extensions, vec!["flac", "wav", "mp3"]);
    }

    #[test]
    fn test_blend_secs_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[visuals]\npreset_blend_secs = inf\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.visuals.preset_blend_secs, MAX_BLEND_SECS);

        std::fs::write(&path, "[visuals]\npreset_blend_secs = nan\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.visuals.preset_blend_secs, 1.0);

        let visuals = VisualsConfig {
            preset_blend_secs: -2.0,
            ..VisualsConfig::default()
        };
        assert_eq!(visuals.blend_secs(), 0.0);
    }

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.api.max_attempts, 3);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.max_live_plays, config.server.max_live_plays);
    }
}
