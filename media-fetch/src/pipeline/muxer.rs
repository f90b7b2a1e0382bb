//! Muxer capability: combines a video and an audio file into one container.
//!
//! The shipped implementation shells out to ffmpeg, copying the video stream
//! and encoding audio to AAC with `+faststart` so playback can begin before
//! the whole file has arrived.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Number of stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Encoder preset (encoding speed vs quality tradeoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    #[default]
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ultrafast" => Ok(Self::Ultrafast),
            "superfast" => Ok(Self::Superfast),
            "veryfast" => Ok(Self::Veryfast),
            "faster" => Ok(Self::Faster),
            "fast" => Ok(Self::Fast),
            "medium" => Ok(Self::Medium),
            "slow" => Ok(Self::Slow),
            "slower" => Ok(Self::Slower),
            "veryslow" => Ok(Self::Veryslow),
            other => Err(Error::config(format!("unknown preset `{other}`"))),
        }
    }
}

/// Inputs and output of one mux invocation.
#[derive(Debug, Clone, Copy)]
pub struct MuxRequest<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub output: &'a Path,
    pub preset: Preset,
}

/// Combines two elementary-stream files into one playable file.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Produce `request.output`, or fail with [`Error::Merge`]. Must not start
    /// work when `cancel` has already fired and must stop when it fires.
    async fn mux(&self, request: &MuxRequest<'_>, cancel: &CancellationToken) -> Result<()>;
}

/// Muxer backed by an ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: String,
}

impl FfmpegMuxer {
    /// `binary` is either a bare name looked up on `PATH` or a path.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate the executable. Resolved per call so installing ffmpeg does
    /// not require a restart.
    fn resolve_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary)
            .map_err(|e| Error::merge(format!("muxer executable `{}` not found: {}", self.binary, e)))
    }

    fn build_args(request: &MuxRequest<'_>) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            request.video.to_string_lossy().into_owned(),
            "-i".to_string(),
            request.audio.to_string_lossy().into_owned(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-preset".to_string(),
            request.preset.as_str().to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            request.output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, request: &MuxRequest<'_>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::merge("deadline exceeded before merge started"));
        }

        let binary = self.resolve_binary()?;
        let args = Self::build_args(request);
        debug!(binary = %binary.display(), ?args, "Spawning muxer");

        let start = std::time::Instant::now();
        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::merge(format!("failed to spawn {}: {}", binary.display(), e)))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.to_lowercase().contains("error") {
                        warn!("muxer stderr: {}", line);
                    } else {
                        debug!("muxer stderr: {}", line);
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        let outcome = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let status = match outcome {
            Some(status) => status.map_err(|e| Error::merge(format!("failed to wait for muxer: {e}")))?,
            None => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill muxer after cancellation");
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Err(Error::merge("deadline exceeded during merge"));
            }
        };

        let tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if !status.success() {
            let tail: Vec<String> = tail.into_iter().collect();
            return Err(Error::merge(format!(
                "muxer exited with {}: {}",
                status,
                tail.join("\n")
            )));
        }

        info!(
            output = %request.output.display(),
            duration_secs = start.elapsed().as_secs_f64(),
            "Merge complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(video: &'a Path, audio: &'a Path, output: &'a Path) -> MuxRequest<'a> {
        MuxRequest {
            video,
            audio,
            output,
            preset: Preset::Veryfast,
        }
    }

    #[test]
    fn test_preset_parse_and_display() {
        assert_eq!("ultrafast".parse::<Preset>().unwrap(), Preset::Ultrafast);
        assert_eq!(" Medium ".parse::<Preset>().unwrap(), Preset::Medium);
        assert!("warp".parse::<Preset>().is_err());
        assert_eq!(Preset::Veryslow.to_string(), "veryslow");
        assert_eq!(Preset::default(), Preset::Veryfast);
    }

    #[test]
    fn test_build_args() {
        let req = request(Path::new("/s/1_video.tmp"), Path::new("/s/1_audio.tmp"), Path::new("/s/1_final.mp4"));
        let args = FfmpegMuxer::build_args(&req);

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some("/s/1_final.mp4"));

        let joined = args.join(" ");
        assert!(joined.contains("-i /s/1_video.tmp -i /s/1_audio.tmp"));
        assert!(joined.contains("-c:v copy -c:a aac"));
        assert!(joined.contains("-preset veryfast"));
        assert!(joined.contains("-movflags +faststart"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_merge_error() {
        let muxer = FfmpegMuxer::new("definitely-not-a-real-muxer-binary");
        let p = Path::new("/nonexistent");
        let err = muxer
            .mux(&request(p, p, p), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Merge(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_cancelled_deadline_skips_spawn() {
        // the deadline is checked before the binary is resolved
        let muxer = FfmpegMuxer::new("definitely-not-a-real-muxer-binary");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let p = Path::new("/nonexistent");

        let err = muxer.mux(&request(p, p, p), &cancel).await.unwrap_err();
        assert!(err.to_string().contains("before merge started"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_merge_error() {
        let muxer = FfmpegMuxer::new("false");
        let p = Path::new("/nonexistent");
        let err = muxer
            .mux(&request(p, p, p), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Merge(ref msg) if msg.contains("muxer exited with")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_during_merge_kills_muxer() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("muxer.pid");
        let script = dir.path().join("slow-muxer");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let muxer = FfmpegMuxer::new(script.to_string_lossy().into_owned());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let p = Path::new("/nonexistent");
        let err = muxer.mux(&request(p, p, p), &cancel).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, Error::Merge(ref msg) if msg.contains("during merge")));

        #[cfg(target_os = "linux")]
        {
            if let Ok(pid) = std::fs::read_to_string(&pid_file) {
                let proc_dir = format!("/proc/{}", pid.trim());
                assert!(!Path::new(&proc_dir).exists(), "muxer still running");
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let muxer = FfmpegMuxer::new("true");
        let p = Path::new("/nonexistent");
        muxer
            .mux(&request(p, p, p), &CancellationToken::new())
            .await
            .unwrap();
    }
}
