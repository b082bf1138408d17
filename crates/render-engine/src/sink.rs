//! Frame sinks: where composited output frames go.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use reframe_common::error::{ReframeError, ReframeResult};
use reframe_model::geometry::FrameSize;

use crate::ffmpeg::{drain_stderr, encoder_args, join_stderr, FfmpegTools};

/// Consumer of output frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, image: &RgbImage) -> ReframeResult<()>;

    /// Flush and close the output.
    fn finish(&mut self) -> ReframeResult<()>;

    /// Stop early and remove any partial output.
    fn abort(&mut self);

    fn frames_written(&self) -> u64;
}

/// Numbered PNG files in a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ImageSequenceSink {
    pub fn create(dir: impl AsRef<Path>) -> ReframeResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, image: &RgbImage) -> ReframeResult<()> {
        let path = self
            .dir
            .join(format!("frame_{:06}.png", self.written.len()));
        image.save(&path).map_err(|e| {
            ReframeError::encode(format!("Failed to write {}: {e}", path.display()))
        })?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> ReframeResult<()> {
        tracing::debug!(
            dir = %self.dir.display(),
            frames = self.written.len(),
            "Image sequence written"
        );
        Ok(())
    }

    fn abort(&mut self) {
        for path in self.written.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }

    fn frames_written(&self) -> u64 {
        self.written.len() as u64
    }
}

struct Encoder {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
}

/// H.264 (or configured codec) video encoded by an ffmpeg subprocess.
///
/// The process starts on the first frame, so a clip with no frames leaves
/// no output file behind.
pub struct FfmpegSink {
    output: PathBuf,
    size: FrameSize,
    fps: f64,
    audio_from: Option<PathBuf>,
    tools: FfmpegTools,
    encoder: Option<Encoder>,
    frames: u64,
}

impl FfmpegSink {
    pub fn new(output: impl AsRef<Path>, size: FrameSize, fps: f64, tools: FfmpegTools) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
            size,
            fps,
            audio_from: None,
            tools,
            encoder: None,
            frames: 0,
        }
    }

    /// Copy the audio stream (if any) from this file into the output.
    pub fn with_audio_from(mut self, source: impl AsRef<Path>) -> Self {
        self.audio_from = Some(source.as_ref().to_path_buf());
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn start(&mut self) -> ReframeResult<&mut Encoder> {
        if self.encoder.is_none() {
            if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let args = encoder_args(
                &self.tools,
                self.size,
                self.fps,
                self.audio_from.as_ref(),
                &self.output,
            );
            tracing::debug!(args = ?args, "Running ffmpeg encoder");

            let mut child = Command::new(&self.tools.ffmpeg)
                .args(&args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| {
                    ReframeError::encode(format!("Failed to start {}: {e}", self.tools.ffmpeg))
                })?;

            tracing::info!(
                pid = child.id(),
                output = %self.output.display(),
                size = %self.size,
                fps = self.fps,
                "ffmpeg encoder started"
            );

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| ReframeError::encode("Failed to capture ffmpeg stdin"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| ReframeError::encode("Failed to capture ffmpeg stderr"))?;

            self.encoder = Some(Encoder {
                child,
                stdin: Some(BufWriter::new(stdin)),
                stderr: Some(drain_stderr(stderr)),
            });
        }

        self.encoder
            .as_mut()
            .ok_or_else(|| ReframeError::encode("ffmpeg encoder not running"))
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, image: &RgbImage) -> ReframeResult<()> {
        if image.dimensions() != (self.size.width, self.size.height) {
            return Err(ReframeError::encode(format!(
                "Frame is {}x{}, encoder expects {}",
                image.width(),
                image.height(),
                self.size
            )));
        }

        let encoder = self.start()?;
        let stdin = encoder
            .stdin
            .as_mut()
            .ok_or_else(|| ReframeError::encode("ffmpeg stdin already closed"))?;
        if let Err(e) = stdin.write_all(image.as_raw()) {
            let stderr = join_stderr(encoder.stderr.take());
            return Err(ReframeError::encode(format!(
                "Failed writing frame to ffmpeg: {e}: {}",
                stderr.trim()
            )));
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> ReframeResult<()> {
        let Some(mut encoder) = self.encoder.take() else {
            tracing::debug!(output = %self.output.display(), "No frames; encoder never started");
            return Ok(());
        };

        if let Some(mut stdin) = encoder.stdin.take() {
            stdin
                .flush()
                .map_err(|e| ReframeError::encode(format!("Failed flushing ffmpeg input: {e}")))?;
        }

        let status = encoder
            .child
            .wait()
            .map_err(|e| ReframeError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(encoder.stderr.take());
        if !status.success() {
            return Err(ReframeError::encode(format!(
                "ffmpeg encode failed (status {status}): {}",
                stderr.trim()
            )));
        }

        tracing::info!(
            output = %self.output.display(),
            frames = self.frames,
            "Encoding finished"
        );
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            encoder.stdin.take();
            let _ = encoder.child.kill();
            let _ = encoder.child.wait();
            join_stderr(encoder.stderr.take());
            let _ = std::fs::remove_file(&self.output);
            tracing::debug!(output = %self.output.display(), "Encoder aborted");
        }
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            self.abort();
        }
    }
}
