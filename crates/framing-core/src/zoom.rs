//! Slow oscillating zoom.
//!
//! A periodic waveform independent of subject motion keeps static shots
//! from looking frozen. Period and amplitude are drawn once per clip from a
//! seeded RNG, so a clip re-rendered with the same seed zooms identically.
//!
//! The waveform starts at 1.0 (no zoom), rises to `1 + amplitude` at half a
//! period, and returns to 1.0.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reframe_common::clock::FrameClock;
use serde::{Deserialize, Serialize};

/// Shape of the zoom oscillation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomWaveform {
    /// Raised cosine: smooth acceleration at both ends.
    #[default]
    Sine,
    /// Linear ramps in and out.
    Triangle,
}

impl ZoomWaveform {
    /// Waveform value in [0, 1] at `phase` periods; 0 at whole periods.
    pub fn sample(&self, phase: f64) -> f64 {
        let frac = phase.rem_euclid(1.0);
        match self {
            Self::Sine => (1.0 - (2.0 * std::f64::consts::PI * frac).cos()) / 2.0,
            Self::Triangle => 1.0 - (1.0 - 2.0 * frac).abs(),
        }
    }
}

/// Configuration for the zoom generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// When false the zoom is a constant 1.0.
    pub enabled: bool,

    pub waveform: ZoomWaveform,

    /// Shortest oscillation period in seconds.
    pub period_min_secs: f64,

    /// Longest oscillation period in seconds.
    pub period_max_secs: f64,

    /// Smallest peak zoom above 1.0.
    pub amplitude_min: f64,

    /// Largest peak zoom above 1.0.
    pub amplitude_max: f64,

    /// Hard upper bound on the zoom factor.
    pub max_zoom: f64,

    /// Minimum fraction of the crop area that stays visible when zoomed.
    pub min_visible_area: f64,

    /// Fixed RNG seed; a random seed is drawn when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            waveform: ZoomWaveform::Sine,
            period_min_secs: 6.0,
            period_max_secs: 10.0,
            amplitude_min: 0.10,
            amplitude_max: 0.15,
            max_zoom: 1.2,
            min_visible_area: 0.5,
            seed: None,
        }
    }
}

impl ZoomConfig {
    /// Largest zoom allowed by both `max_zoom` and `min_visible_area`.
    pub fn zoom_ceiling(&self) -> f64 {
        let area_cap = if self.min_visible_area > 0.0 {
            1.0 / self.min_visible_area.sqrt()
        } else {
            f64::INFINITY
        };
        self.max_zoom.min(area_cap).max(1.0)
    }

    /// The configured seed, or a freshly drawn one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Per-clip parameters drawn from the RNG.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomParams {
    pub amplitude: f64,
    pub period_secs: f64,
}

/// Zoom factor and its per-frame rate of change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub factor: f64,
    pub rate: f64,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            factor: 1.0,
            rate: 0.0,
        }
    }
}

/// Frame-synchronous zoom generator for one clip.
#[derive(Debug, Clone)]
pub struct ZoomGenerator {
    enabled: bool,
    waveform: ZoomWaveform,
    params: ZoomParams,
    ceiling: f64,
    period_frames: f64,
    frame: u64,
    state: ZoomState,
}

impl ZoomGenerator {
    pub fn new(config: &ZoomConfig, clock: &FrameClock, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let period_secs = draw(&mut rng, config.period_min_secs, config.period_max_secs);
        let amplitude = draw(&mut rng, config.amplitude_min, config.amplitude_max);

        let ceiling = config.zoom_ceiling();
        let params = ZoomParams {
            amplitude: amplitude.clamp(0.0, ceiling - 1.0),
            period_secs,
        };

        Self {
            enabled: config.enabled,
            waveform: config.waveform,
            params,
            ceiling,
            period_frames: (period_secs * clock.fps()).max(1.0),
            frame: 0,
            state: ZoomState::default(),
        }
    }

    pub fn params(&self) -> ZoomParams {
        self.params
    }

    /// Last emitted state.
    pub fn state(&self) -> ZoomState {
        self.state
    }

    /// Zoom factor at an arbitrary frame.
    pub fn factor_at(&self, frame: u64) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let phase = frame as f64 / self.period_frames;
        (1.0 + self.params.amplitude * self.waveform.sample(phase)).clamp(1.0, self.ceiling)
    }

    /// Emit the zoom for the next frame.
    pub fn next_state(&mut self) -> ZoomState {
        let factor = self.factor_at(self.frame);
        let rate = if self.frame == 0 {
            0.0
        } else {
            factor - self.state.factor
        };
        self.frame += 1;
        self.state = ZoomState { factor, rate };
        self.state
    }
}

fn draw(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.random_range(lo..=hi)
    } else {
        lo
    }
}
