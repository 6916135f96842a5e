use crate::{Error, Result};
use betterhist_engine::{AnyMatcher, MarkerMatcher, PatternMatcher, Segmenter, SegmenterConfig};
use betterhist_types::SessionId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FALLBACK_SHELL: &str = "/bin/sh";

/// Resolve the data directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. BETTERHIST_PATH environment variable (with tilde expansion)
/// 3. XDG data directory (recommended default)
/// 4. ~/.betterhist (fallback for systems without XDG)
pub fn resolve_data_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("BETTERHIST_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("betterhist"));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".betterhist"));
    }

    Err(Error::Config(
        "Could not determine data directory: no HOME directory or XDG data directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

pub fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

/// Location of the record store for `session_id`.
pub fn store_path(data_dir: &Path, session_id: &SessionId) -> PathBuf {
    sessions_dir(data_dir).join(session_id.store_file_name())
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Regex matched against the pending partial line; `None` uses the built-in pattern.
    pub prompt_pattern: Option<String>,
    pub use_shell_markers: bool,
    pub max_output_bytes: usize,
    pub strip_colors: bool,
    pub idle_check_ms: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            prompt_pattern: None,
            use_shell_markers: true,
            max_output_bytes: 1024 * 1024,
            strip_colors: false,
            idle_check_ms: 150,
        }
    }
}

impl SegmentationConfig {
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            strip_colors: self.strip_colors,
            max_output_bytes: self.max_output_bytes,
            use_shell_markers: self.use_shell_markers,
        }
    }

    pub fn build_segmenter(&self) -> Result<Segmenter> {
        let pattern = match &self.prompt_pattern {
            Some(pattern) => PatternMatcher::new(pattern).map_err(|e| {
                Error::Config(format!("invalid prompt_pattern '{}': {}", pattern, e))
            })?,
            None => PatternMatcher::default(),
        };

        let matcher = AnyMatcher::new(vec![Box::new(MarkerMatcher), Box::new(pattern)]);
        Ok(Segmenter::new(self.segmenter_config()).with_matcher(Box::new(matcher)))
    }

    pub fn idle_check(&self) -> Duration {
        Duration::from_millis(self.idle_check_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Chunks buffered between the output pump and the recorder.
    pub tap_capacity: usize,
    /// How long to keep draining pty output after the shell exits.
    pub drain_grace_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            tap_capacity: 256,
            drain_grace_ms: 300,
            poll_interval_ms: 50,
        }
    }
}

impl ProxyConfig {
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub preview_width: usize,
    /// Fence tag override for Markdown blocks.
    pub language: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preview_width: 40,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shell: Option<String>,
    pub segmentation: SegmentationConfig,
    pub proxy: ProxyConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join("config.toml")
    }

    /// Shell to spawn: configured value, then `$SHELL`, then `/bin/sh`.
    pub fn shell_program(&self, env_shell: Option<&str>) -> String {
        self.shell
            .as_deref()
            .or(env_shell)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(FALLBACK_SHELL)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.proxy.tap_capacity, 256);
        assert_eq!(config.segmentation.max_output_bytes, 1024 * 1024);
        assert_eq!(config.render.preview_width, 40);
        assert!(config.segmentation.use_shell_markers);
    }

    #[test]
    fn test_load_nonexistent_returns_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_from(&temp_dir.path().join("nonexistent.toml"))?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = Config::path_in(temp_dir.path());
        std::fs::write(
            &path,
            r#"
            shell = "/bin/zsh"

            [segmentation]
            strip_colors = true
            unknown_key = 1

            [render]
            preview_width = 60
            "#,
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.shell.as_deref(), Some("/bin/zsh"));
        assert!(config.segmentation.strip_colors);
        assert_eq!(config.segmentation.idle_check_ms, 150);
        assert_eq!(config.render.preview_width, 60);
        assert_eq!(config.proxy, ProxyConfig::default());
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_config_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = Config::path_in(temp_dir.path());
        std::fs::write(&path, "[proxy]\ntap_capacity = \"many\"\n")?;

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_prompt_pattern_is_rejected() {
        let config = SegmentationConfig {
            prompt_pattern: Some("([".to_string()),
            ..SegmentationConfig::default()
        };

        match config.build_segmenter() {
            Err(Error::Config(msg)) => assert!(msg.contains("prompt_pattern")),
            _ => panic!("expected a config error"),
        }
    }

    #[test]
    fn test_shell_program_resolution() {
        let mut config = Config::default();
        assert_eq!(config.shell_program(Some("/bin/bash")), "/bin/bash");
        assert_eq!(config.shell_program(None), "/bin/sh");

        config.shell = Some("/usr/bin/fish".to_string());
        assert_eq!(config.shell_program(Some("/bin/bash")), "/usr/bin/fish");
    }

    #[test]
    fn test_explicit_data_dir_wins() -> Result<()> {
        assert_eq!(resolve_data_dir(Some("/tmp/bh"))?, PathBuf::from("/tmp/bh"));
        Ok(())
    }

    #[test]
    fn test_store_path_layout() {
        let id = SessionId::generate();
        let path = store_path(Path::new("/data"), &id);
        assert_eq!(path, PathBuf::from(format!("/data/sessions/{}.db", id)));
    }
}
