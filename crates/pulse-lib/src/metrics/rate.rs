use crate::signal::{CycleIndex, Label, Waveform};
use serde::{Deserialize, Serialize};

/// Thresholds and timers of the beat-to-BPM estimator. Times are milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Minimum rise from the previous waveform sample to count as an upstroke.
    pub slope_threshold: f64,
    /// Minimum sample value for an upstroke to count as a beat.
    pub amplitude_threshold: f64,
    /// Debounce between two accepted beats.
    pub refractory_ms: u64,
    /// Silence after which BPM is forced to the patient's baseline.
    pub fallback_after_ms: u64,
    /// Delay after start-up before an unset display gets a default value.
    pub placeholder_after_ms: u64,
    pub min_bpm: u32,
    pub max_bpm: u32,
    /// Weight kept from the previous BPM on every beat.
    pub smoothing: f64,
    pub default_bpm: u32,
    pub abnormal_default_bpm: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            slope_threshold: 0.15,
            amplitude_threshold: 0.5,
            refractory_ms: 200,
            fallback_after_ms: 3000,
            placeholder_after_ms: 2000,
            min_bpm: 40,
            max_bpm: 200,
            smoothing: 0.8,
            default_bpm: 75,
            abnormal_default_bpm: 95,
        }
    }
}

/// What changed the BPM on a given update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateEvent {
    Beat { elapsed_ms: u64, instant_bpm: u32, bpm: u32 },
    Fallback { bpm: u32 },
    Placeholder { bpm: u32 },
}

/// Instantaneous BPM for a beat interval, scaled by playback speed and clamped.
pub fn beat_bpm(elapsed_ms: u64, speed: f64, cfg: &RateConfig) -> u32 {
    if elapsed_ms == 0 {
        return cfg.max_bpm;
    }
    let raw = 60_000.0 / elapsed_ms as f64;
    (raw * speed)
        .round()
        .clamp(cfg.min_bpm as f64, cfg.max_bpm as f64) as u32
}

/// Exponential smoothing of the displayed BPM.
pub fn smooth_bpm(previous: u32, instant: u32, smoothing: f64) -> u32 {
    (previous as f64 * smoothing + instant as f64 * (1.0 - smoothing)).round() as u32
}

fn scaled(rate: u32, speed: f64) -> u32 {
    (rate as f64 * speed).round().max(0.0) as u32
}

/// Streaming heart-rate estimate derived from upstrokes in the waveform.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    cfg: RateConfig,
    started_ms: u64,
    last_beat_ms: u64,
    /// `0` until the first beat or fallback.
    bpm: u32,
    displayed: Option<u32>,
    placeholder_checked: bool,
}

impl RateEstimator {
    pub fn new(cfg: RateConfig, now_ms: u64) -> Self {
        Self {
            cfg,
            started_ms: now_ms,
            last_beat_ms: now_ms,
            bpm: 0,
            displayed: None,
            placeholder_checked: false,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Value shown to the user; `None` renders as the `--` placeholder.
    pub fn displayed(&self) -> Option<u32> {
        self.displayed
    }

    pub fn last_beat_ms(&self) -> u64 {
        self.last_beat_ms
    }

    pub fn config(&self) -> &RateConfig {
        &self.cfg
    }

    fn show(&mut self, bpm: u32) {
        self.bpm = bpm;
        self.displayed = Some(bpm);
    }

    /// Feed the sample at `index`. Slopes are taken against the previous
    /// sample of the full cycle, never against the analysis buffer.
    pub fn update(
        &mut self,
        index: CycleIndex,
        waveform: &Waveform,
        speed: f64,
        baseline: Option<u32>,
        now_ms: u64,
    ) -> Option<RateEvent> {
        if index.get() == 0 {
            return None;
        }
        let current = waveform.at(index);
        let previous = waveform.at(index.prev());

        if current - previous > self.cfg.slope_threshold && current > self.cfg.amplitude_threshold
        {
            let elapsed_ms = now_ms.saturating_sub(self.last_beat_ms);
            if elapsed_ms > self.cfg.refractory_ms {
                self.last_beat_ms = now_ms;
                let instant_bpm = beat_bpm(elapsed_ms, speed, &self.cfg);
                let bpm = if self.bpm == 0 {
                    instant_bpm
                } else {
                    smooth_bpm(self.bpm, instant_bpm, self.cfg.smoothing)
                };
                self.show(bpm);
                return Some(RateEvent::Beat {
                    elapsed_ms,
                    instant_bpm,
                    bpm,
                });
            }
        }

        if now_ms.saturating_sub(self.last_beat_ms) > self.cfg.fallback_after_ms {
            let bpm = scaled(baseline.unwrap_or(self.cfg.default_bpm), speed);
            self.show(bpm);
            self.last_beat_ms = now_ms;
            return Some(RateEvent::Fallback { bpm });
        }
        None
    }

    /// One-shot start-up check: once the placeholder delay has passed, an
    /// empty display gets a label-dependent default.
    pub fn check_placeholder(&mut self, now_ms: u64, label: Label, speed: f64) -> Option<RateEvent> {
        if self.placeholder_checked
            || now_ms.saturating_sub(self.started_ms) < self.cfg.placeholder_after_ms
        {
            return None;
        }
        self.placeholder_checked = true;
        if self.displayed.is_some() {
            return None;
        }
        let rate = if label.is_abnormal() {
            self.cfg.abnormal_default_bpm
        } else {
            self.cfg.default_bpm
        };
        let bpm = scaled(rate, speed);
        self.show(bpm);
        Some(RateEvent::Placeholder { bpm })
    }
}
