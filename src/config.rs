//! Environment-driven settings for the helper.
//!
//! Every variable is optional; an empty value counts as unset.

use std::path::PathBuf;

pub const ENV_YTDLP: &str = "YTDL_HELPER_YTDLP";
pub const ENV_FFMPEG: &str = "YTDL_HELPER_FFMPEG";
pub const ENV_OUTPUT_DIR: &str = "YTDL_HELPER_OUTPUT_DIR";
pub const ENV_LOGGER: &str = "YTDL_HELPER_LOGGER";

const DEFAULT_OUTPUT_DIR: &str = "./downloads";
const DEFAULT_LOGGER: &str = "ytdl_helper";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Explicit yt-dlp executable; otherwise the embedded or PATH one is used
    pub ytdlp_path: Option<PathBuf>,
    /// Passed to yt-dlp as `--ffmpeg-location`
    pub ffmpeg_location: Option<PathBuf>,
    /// Output directory pre-filled in the form
    pub default_output_dir: PathBuf,
    /// Logger name printed in every status line
    pub logger_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_location: None,
            default_output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            logger_name: DEFAULT_LOGGER.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            ytdlp_path: get(ENV_YTDLP).map(PathBuf::from),
            ffmpeg_location: get(ENV_FFMPEG).map(PathBuf::from),
            default_output_dir: get(ENV_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.default_output_dir),
            logger_name: get(ENV_LOGGER).unwrap_or(defaults.logger_name),
        }
    }
}
