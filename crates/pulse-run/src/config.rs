use anyhow::{Context, Result};
use log::warn;
use pulse_lib::{RateConfig, SegmentConfig, BUFFER_CAPACITY};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Playback knobs. Every field may be omitted from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial playback speed multiplier.
    pub speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Extra divisor on the visible frame rate.
    pub slow_factor: usize,
    /// Run segment detection on every Nth cyclic index.
    pub detect_every: usize,
    pub normalize: bool,
    pub autoplay: bool,
    pub buffer_capacity: usize,
    pub particle_seed: u64,
    pub segments: SegmentConfig,
    pub rate: RateConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 0.15,
            min_speed: 0.05,
            max_speed: 4.0,
            slow_factor: 2,
            detect_every: 5,
            normalize: true,
            autoplay: true,
            buffer_capacity: BUFFER_CAPACITY,
            particle_seed: 0,
            segments: SegmentConfig::default(),
            rate: RateConfig::default(),
        }
    }
}

impl PlaybackConfig {
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            return self.min_speed;
        }
        speed.clamp(self.min_speed, self.max_speed)
    }

    /// Sample buffer length. Never shorter than the window detection needs.
    pub fn buffer_len(&self) -> usize {
        self.buffer_capacity.max(self.segments.min_samples)
    }

    /// Number of display refreshes per processed sample.
    pub fn frame_stride(&self, speed: f64) -> usize {
        let per_sample = (1.0 / speed).round();
        let per_sample = if per_sample.is_finite() && per_sample >= 1.0 {
            per_sample as usize
        } else {
            1
        };
        per_sample * self.slow_factor.max(1)
    }
}

pub fn read_config(path: &Path) -> Result<PlaybackConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: PlaybackConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    if cfg.buffer_capacity < cfg.segments.min_samples {
        warn!(
            "{}: buffer_capacity {} is below segments.min_samples {}, using {}",
            path.display(),
            cfg.buffer_capacity,
            cfg.segments.min_samples,
            cfg.buffer_len()
        );
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stride_follows_speed() {
        let cfg = PlaybackConfig::default();
        assert_eq!(cfg.frame_stride(0.15), 7 * 2);
        assert_eq!(cfg.frame_stride(1.0), 2);
        assert_eq!(cfg.frame_stride(0.5), 4);
        // fast playback never drops below one refresh per sample
        assert_eq!(cfg.frame_stride(4.0), 2);
    }

    #[test]
    fn speed_is_clamped() {
        let cfg = PlaybackConfig::default();
        assert_eq!(cfg.clamp_speed(0.0), 0.05);
        assert_eq!(cfg.clamp_speed(10.0), 4.0);
        assert_eq!(cfg.clamp_speed(0.7), 0.7);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        fs::write(
            &path,
            "speed = 1.0\nnormalize = false\n\n[rate]\nfallback_after_ms = 1500\n",
        )
        .unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.speed, 1.0);
        assert!(!cfg.normalize);
        assert_eq!(cfg.rate.fallback_after_ms, 1500);
        assert_eq!(cfg.rate.refractory_ms, 200);
        assert_eq!(cfg.detect_every, 5);
        assert_eq!(cfg.segments.min_samples, 30);
    }

    #[test]
    fn short_buffer_is_widened_for_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        fs::write(&path, "buffer_capacity = 10\n").unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.buffer_capacity, 10);
        assert_eq!(cfg.buffer_len(), 30);

        let wide = PlaybackConfig {
            buffer_capacity: 40,
            ..PlaybackConfig::default()
        };
        assert_eq!(wide.buffer_len(), 40);
    }

    #[test]
    fn missing_file_names_path() {
        let err = read_config(Path::new("/nonexistent/pulse.toml")).unwrap_err();
        assert!(err.to_string().contains("pulse.toml"));
    }
}
