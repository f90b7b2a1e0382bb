//! Process configuration.
//!
//! Loaded once at startup from the environment and shared read-only by every
//! component. Each field can be overridden independently; an override that
//! fails to parse is ignored with a warning and the default is kept.

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::pipeline::muxer::Preset;

const GIB: u64 = 1024 * 1024 * 1024;

/// Service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Highest video height the format selector may pick.
    pub max_video_height: u32,
    /// Chunk size for fetch and serve I/O, in bytes.
    pub buffer_size: usize,
    /// Deadline covering resolve, fetch and merge of one download.
    #[serde(serialize_with = "serialize_duration")]
    pub download_timeout: Duration,
    /// Maximum number of pipelines holding fetch/mux resources at once.
    pub max_concurrent: usize,
    /// How long a request may wait for an admission slot.
    #[serde(serialize_with = "serialize_duration")]
    pub admission_wait: Duration,
    /// Janitor sweep interval.
    #[serde(serialize_with = "serialize_duration")]
    pub cleanup_interval: Duration,
    /// Scratch directory for per-run artifacts.
    pub temp_dir: PathBuf,
    /// Encoder preset handed to the muxer.
    pub ffmpeg_preset: Preset,
    /// Muxer executable, resolved on `PATH` unless absolute.
    pub ffmpeg_path: String,
    /// Scratch files older than this are swept by the janitor.
    #[serde(serialize_with = "serialize_duration")]
    pub max_file_age: Duration,
    /// HTTP bind address.
    pub bind_address: String,
    /// HTTP port.
    pub server_port: u16,
    /// Free space the scratch filesystem must keep, in GiB.
    pub min_disk_space_gb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_video_height: 1080,
            buffer_size: 128 * 1024,
            download_timeout: Duration::from_secs(15 * 60),
            max_concurrent: 3,
            admission_wait: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(15 * 60),
            temp_dir: std::env::temp_dir().join("media-fetch"),
            ffmpeg_preset: Preset::Veryfast,
            ffmpeg_path: "ffmpeg".to_string(),
            max_file_age: Duration::from_secs(30 * 60),
            bind_address: "0.0.0.0".to_string(),
            server_port: 7839,
            min_disk_space_gb: 2,
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `MAX_VIDEO_HEIGHT`, `BUFFER_SIZE`, `MAX_CONCURRENT`, `MIN_DISK_SPACE_GB`, `SERVER_PORT`
    /// - `DOWNLOAD_TIMEOUT`, `ADMISSION_WAIT`, `CLEANUP_INTERVAL`, `MAX_FILE_AGE` (e.g. "90s", "15m", "1h30m")
    /// - `TEMP_DIR`, `FFMPEG_PRESET`, `FFMPEG_PATH`, `BIND_ADDRESS`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = EnvOverrides { lookup: &lookup };

        env.apply("MAX_VIDEO_HEIGHT", &mut config.max_video_height, parse_positive);
        env.apply("BUFFER_SIZE", &mut config.buffer_size, parse_positive);
        env.apply("MAX_CONCURRENT", &mut config.max_concurrent, parse_positive);
        env.apply("MIN_DISK_SPACE_GB", &mut config.min_disk_space_gb, parse_value);
        env.apply("SERVER_PORT", &mut config.server_port, parse_value);
        env.apply("DOWNLOAD_TIMEOUT", &mut config.download_timeout, parse_interval);
        env.apply("ADMISSION_WAIT", &mut config.admission_wait, parse_interval);
        env.apply("CLEANUP_INTERVAL", &mut config.cleanup_interval, parse_interval);
        env.apply("MAX_FILE_AGE", &mut config.max_file_age, parse_interval);
        env.apply("FFMPEG_PRESET", &mut config.ffmpeg_preset, parse_value);
        env.apply("TEMP_DIR", &mut config.temp_dir, |s| Some(PathBuf::from(s)));
        env.apply("FFMPEG_PATH", &mut config.ffmpeg_path, |s| Some(s.to_string()));
        env.apply("BIND_ADDRESS", &mut config.bind_address, |s| Some(s.to_string()));

        config
    }

    /// Minimum free space on the scratch filesystem, in bytes.
    pub fn min_disk_space_bytes(&self) -> u64 {
        self.min_disk_space_gb.saturating_mul(GIB)
    }
}

struct EnvOverrides<'a, F> {
    lookup: &'a F,
}

impl<F> EnvOverrides<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn apply<T>(&self, key: &str, target: &mut T, parse: impl Fn(&str) -> Option<T>) {
        let Some(raw) = (self.lookup)(key) else {
            return;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        match parse(trimmed) {
            Some(value) => *target = value,
            None => warn!(key, value = %trimmed, "Ignoring invalid configuration override"),
        }
    }
}

fn parse_value<T: FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

fn parse_positive<T>(s: &str) -> Option<T>
where
    T: FromStr + Default + PartialOrd,
{
    s.parse().ok().filter(|v| *v > T::default())
}

fn parse_interval(s: &str) -> Option<Duration> {
    parse_duration(s).filter(|d| !d.is_zero())
}

/// Parse a duration such as `"90s"`, `"15m"`, `"1h30m"`, `"250ms"`, or bare seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total += value * scale;
        rest = &rest[unit_end..];
    }

    Duration::try_from_secs_f64(total).ok()
}

/// Format a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }

    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}
