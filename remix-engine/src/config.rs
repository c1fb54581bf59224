//! Simple configuration persistence for remix
//!
//! Stores where uploads live, where mixes go, and how they are exported.

use crate::compositor::DEFAULT_BACKGROUND_GAIN_DB;
use crate::orchestrator::RemixOptions;
use crate::transform::DEFAULT_MAX_CLIP_SECS;
use remix_codec::{ExportFormat, ExportSettings};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory that `/uploads/...` references are resolved against
    pub media_root: PathBuf,
    /// Directory finished mixes are written to
    pub output_dir: PathBuf,
    pub export_format: ExportFormat,
    /// MP3 bitrate in kbps
    pub bitrate_kbps: u32,
    pub background_gain_db: f32,
    pub max_workers: usize,
    /// Per-remix time budget in seconds
    pub deadline_secs: Option<u64>,
    /// Longest a single edited clip may run, in seconds
    pub max_clip_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        let export = ExportSettings::default();
        Self {
            media_root: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            export_format: export.format,
            bitrate_kbps: export.bitrate_kbps,
            background_gain_db: DEFAULT_BACKGROUND_GAIN_DB,
            max_workers: 4,
            deadline_secs: None,
            max_clip_secs: DEFAULT_MAX_CLIP_SECS,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("remix")
            .join("config.txt")
    }

    /// Orchestrator options derived from this config
    pub fn remix_options(&self) -> RemixOptions {
        RemixOptions {
            export: ExportSettings {
                format: self.export_format,
                bitrate_kbps: self.bitrate_kbps,
            },
            background_gain_db: self.background_gain_db,
            max_workers: self.max_workers,
            deadline: self.deadline_secs.map(Duration::from_secs),
            max_clip_secs: self.max_clip_secs,
            ..RemixOptions::default()
        }
    }

    /// Where a finished mix with this file name is written
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let applied = match key {
                "media_root" => {
                    if !value.is_empty() {
                        config.media_root = PathBuf::from(value);
                    }
                    true
                }
                "output_dir" => {
                    if !value.is_empty() {
                        config.output_dir = PathBuf::from(value);
                    }
                    true
                }
                "export_format" => value
                    .parse::<ExportFormat>()
                    .map(|f| config.export_format = f)
                    .is_ok(),
                "bitrate_kbps" => value.parse::<u32>().map(|b| config.bitrate_kbps = b).is_ok(),
                "background_gain_db" => value
                    .parse::<f32>()
                    .ok()
                    .filter(|db| db.is_finite())
                    .map(|db| config.background_gain_db = db)
                    .is_some(),
                "max_workers" => value
                    .parse::<usize>()
                    .map(|n| config.max_workers = n.max(1))
                    .is_ok(),
                "max_clip_secs" => value
                    .parse::<f64>()
                    .ok()
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .map(|secs| config.max_clip_secs = secs)
                    .is_some(),
                "deadline_secs" => {
                    if value.is_empty() {
                        config.deadline_secs = None;
                        true
                    } else {
                        value
                            .parse::<u64>()
                            .map(|s| config.deadline_secs = Some(s))
                            .is_ok()
                    }
                }
                _ => true, // Ignore unknown keys
            };

            if !applied {
                warn!(key, value, "Ignoring invalid config value");
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# Remix Configuration".to_string(),
            format!("media_root={}", self.media_root.display()),
            format!("output_dir={}", self.output_dir.display()),
            format!("export_format={}", self.export_format),
            format!("bitrate_kbps={}", self.bitrate_kbps),
            format!("background_gain_db={}", self.background_gain_db),
            format!("max_workers={}", self.max_workers),
            format!("max_clip_secs={}", self.max_clip_secs),
        ];

        if let Some(secs) = self.deadline_secs {
            lines.push(format!("deadline_secs={}", secs));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
        assert_eq!(config.export_format, ExportFormat::Mp3);
        assert_eq!(config.bitrate_kbps, 192);
        assert_eq!(config.background_gain_db, -15.0);
    }

    #[test]
    fn test_parse_with_values() {
        let content = "media_root=/srv/remix\nexport_format=wav\nmax_workers=8\ndeadline_secs=30";
        let config = Config::parse(content);
        assert_eq!(config.media_root, PathBuf::from("/srv/remix"));
        assert_eq!(config.export_format, ExportFormat::Wav);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.deadline_secs, Some(30));
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\noutput_dir=/mixes\n# Another comment";
        let config = Config::parse(content);
        assert_eq!(config.output_dir, PathBuf::from("/mixes"));
        assert_eq!(config.output_path("remix.mp3"), PathBuf::from("/mixes/remix.mp3"));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let content = "export_format=flac\nbitrate_kbps=lots\nmax_workers=0\nbackground_gain_db=NaN\nmax_clip_secs=-5\nmystery=1";
        let config = Config::parse(content);
        assert_eq!(config.max_clip_secs, 3600.0);
        assert_eq!(config.export_format, ExportFormat::Mp3);
        assert_eq!(config.bitrate_kbps, 192);
        assert_eq!(config.max_workers, 1);
        assert_eq!(config.background_gain_db, -15.0);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            media_root: PathBuf::from("/test/media"),
            export_format: ExportFormat::Wav,
            background_gain_db: -9.5,
            deadline_secs: Some(12),
            max_clip_secs: 90.5,
            ..Config::default()
        };

        let serialized = config.serialize();
        let parsed = Config::parse(&serialized);

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.txt");

        let config = Config {
            bitrate_kbps: 320,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert!(Config::load_from(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_remix_options() {
        let config = Config {
            export_format: ExportFormat::Wav,
            bitrate_kbps: 128,
            background_gain_db: -20.0,
            max_workers: 2,
            deadline_secs: Some(5),
            max_clip_secs: 600.0,
            ..Config::default()
        };
        let options = config.remix_options();
        assert_eq!(options.max_clip_secs, 600.0);
        assert_eq!(options.export.format, ExportFormat::Wav);
        assert_eq!(options.export.bitrate_kbps, 128);
        assert_eq!(options.background_gain_db, -20.0);
        assert_eq!(options.max_workers, 2);
        assert_eq!(options.deadline, Some(Duration::from_secs(5)));
    }
}
