//! Frame sources: where decoded frames come from.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use reframe_common::clock::FrameClock;
use reframe_common::error::{ReframeError, ReframeResult};
use reframe_model::geometry::FrameSize;

use crate::ffmpeg::{drain_stderr, join_stderr, probe_video, FfmpegTools, VideoProbe};
use crate::frame::Frame;

/// Static properties of a frame source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub size: FrameSize,
    pub fps: f64,
    /// Total frames, when the source knows it up front.
    pub frame_count: Option<u64>,
}

/// A stream of decoded frames in presentation order.
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// Decode the next frame, or `None` at end of input.
    fn next_frame(&mut self) -> ReframeResult<Option<Frame>>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Frames read from a directory of PNG/JPEG files in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    info: SourceInfo,
    clock: FrameClock,
}

impl ImageSequenceSource {
    /// Open a directory of images played back at `fps`.
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> ReframeResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ReframeError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();

        let clock = FrameClock::new(fps);
        let size = match files.first() {
            Some(first) => {
                let (width, height) = image::image_dimensions(first).map_err(|e| {
                    ReframeError::decode(format!("Failed to read {}: {e}", first.display()))
                })?;
                FrameSize::new(width, height)
            }
            None => FrameSize::new(0, 0),
        };

        tracing::debug!(
            dir = %dir.display(),
            frames = files.len(),
            size = %size,
            "Opened image sequence"
        );

        Ok(Self {
            info: SourceInfo {
                size,
                fps: clock.fps(),
                frame_count: Some(files.len() as u64),
            },
            files,
            next: 0,
            clock,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> ReframeResult<Option<Frame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };

        let image = image::open(path)
            .map_err(|e| {
                ReframeError::decode(format!("Failed to decode {}: {e}", path.display()))
            })?
            .to_rgb8();
        if image.dimensions() != (self.info.size.width, self.info.size.height) {
            return Err(ReframeError::decode(format!(
                "{} is {}x{}, expected {}",
                path.display(),
                image.width(),
                image.height(),
                self.info.size
            )));
        }

        let index = self.next as u64;
        self.next += 1;
        Ok(Some(Frame::new(index, self.clock.timestamp_secs(index), image)))
    }
}

/// Frames decoded by an ffmpeg subprocess as raw RGB24.
pub struct FfmpegSource {
    path: PathBuf,
    probe: VideoProbe,
    clock: FrameClock,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    buffer: Vec<u8>,
    next: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probe and start decoding a video file.
    pub fn open(path: impl AsRef<Path>, tools: &FfmpegTools) -> ReframeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let probe = probe_video(tools, &path)?;

        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(&path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ReframeError::decode(format!("Failed to start {}: {e}", tools.ffmpeg)))?;

        tracing::info!(
            pid = child.id(),
            input = %path.display(),
            size = %probe.size,
            fps = probe.fps,
            frames = ?probe.frame_count,
            "ffmpeg decoder started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReframeError::decode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReframeError::decode("Failed to capture ffmpeg stderr"))?;

        let frame_bytes = probe.size.width as usize * probe.size.height as usize * 3;
        Ok(Self {
            path,
            clock: FrameClock::new(probe.fps),
            probe,
            child,
            stdout: BufReader::new(stdout),
            stderr: Some(drain_stderr(stderr)),
            buffer: vec![0; frame_bytes],
            next: 0,
            finished: false,
        })
    }

    /// Whether the source file carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.probe.has_audio
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish(&mut self) -> ReframeResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| ReframeError::decode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr.take());
        if !status.success() {
            return Err(ReframeError::decode(format!(
                "ffmpeg decode of {} failed (status {}): {}",
                self.path.display(),
                status,
                stderr.trim()
            )));
        }
        tracing::debug!(frames = self.next, "ffmpeg decoder finished");
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            size: self.probe.size,
            fps: self.clock.fps(),
            frame_count: self.probe.frame_count,
        }
    }

    fn next_frame(&mut self) -> ReframeResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        if !read_full(&mut self.stdout, &mut self.buffer)? {
            self.finish()?;
            return Ok(None);
        }

        let size = self.probe.size;
        let image = RgbImage::from_raw(size.width, size.height, self.buffer.clone())
            .ok_or_else(|| ReframeError::decode("Decoded frame has the wrong byte length"))?;
        let index = self.next;
        self.next += 1;
        Ok(Some(Frame::new(index, self.clock.timestamp_secs(index), image)))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Fill `buf` completely. Returns `false` on a clean end of stream.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> ReframeResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = match reader.read(&mut buf[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ReframeError::decode(format!(
                    "Failed reading decoded frames: {e}"
                )))
            }
        };
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(ReframeError::decode(format!(
                "Truncated frame: got {filled} of {} bytes",
                buf.len()
            )));
        }
        filled += n;
    }
    Ok(true)
}
