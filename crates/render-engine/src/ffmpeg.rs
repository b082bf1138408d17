//! ffmpeg/ffprobe process helpers shared by the video source and sink.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command};
use std::thread::JoinHandle;

use reframe_common::config::RenderDefaults;
use reframe_common::error::{ReframeError, ReframeResult};
use reframe_model::geometry::FrameSize;
use serde::Deserialize;

/// Locations of the ffmpeg binaries and encoder settings.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::from_defaults(&RenderDefaults::default())
    }
}

impl FfmpegTools {
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            ffmpeg: defaults.ffmpeg_bin.clone(),
            ffprobe: defaults.ffprobe_bin.clone(),
            video_codec: defaults.video_codec.clone(),
            crf: defaults.crf,
            preset: defaults.preset.clone(),
        }
    }

    pub fn ffmpeg_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    pub fn ffprobe_available(&self) -> bool {
        command_exists(&self.ffprobe)
    }
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub size: FrameSize,
    pub fps: f64,
    pub frame_count: Option<u64>,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a video file's first video stream.
pub fn probe_video(tools: &FfmpegTools, path: &Path) -> ReframeResult<VideoProbe> {
    if !path.exists() {
        return Err(ReframeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,width,height,r_frame_rate,avg_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReframeError::decode(format!("Failed to run {}: {e}", tools.ffprobe)))?;

    if !output.status.success() {
        return Err(ReframeError::decode(format!(
            "ffprobe failed for {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ReframeError::decode(format!("No video stream in {}", path.display())))
}

fn parse_probe_json(json: &str) -> Option<VideoProbe> {
    let probe: ProbeOutput = serde_json::from_str(json).ok()?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");
    let video = probe.streams.iter().find(|s| s.codec_type == "video")?;

    let size = FrameSize::new(video.width?, video.height?);
    if !size.is_valid() {
        return None;
    }

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))?;

    Some(VideoProbe {
        size,
        fps,
        frame_count: video.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        has_audio,
    })
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.trim().split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Whether the output path should be encoded by ffmpeg (rather than written
/// as an image sequence directory).
pub fn is_video_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("mp4" | "mov" | "mkv" | "m4v" | "webm")
    )
}

pub(crate) fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Drain stderr on a thread so ffmpeg never blocks on a full pipe.
pub(crate) fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

pub(crate) fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
        })
        .unwrap_or_default()
}

/// Build the encoder argument list for raw RGB24 frames on stdin.
pub(crate) fn encoder_args(
    tools: &FfmpegTools,
    size: FrameSize,
    fps: f64,
    audio_from: Option<&PathBuf>,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{}x{}", size.width, size.height),
        "-r".to_string(),
        format!("{fps}"),
        "-i".to_string(),
        "-".to_string(),
    ];

    if let Some(audio) = audio_from {
        args.extend([
            "-i".to_string(),
            audio.display().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0?".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-shortest".to_string(),
        ]);
    }

    args.extend([
        "-c:v".to_string(),
        tools.video_codec.clone(),
        "-preset".to_string(),
        tools.preset.clone(),
        "-crf".to_string(),
        tools.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args.push(output.display().to_string());
    args
}
