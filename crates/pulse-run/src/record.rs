use crate::session::{FrameOutcome, FrameReport};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use pulse_lib::RateEvent;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Flat per-frame row of the TSV frame log. Undetected waves are `-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub frame: u64,
    pub time_ms: u64,
    pub index: usize,
    pub raw: f64,
    pub value: f64,
    pub phase: String,
    #[serde(default)]
    pub bpm: Option<u32>,
    pub p_start: i64,
    pub p_end: i64,
    pub qrs_start: i64,
    pub qrs_end: i64,
    pub t_start: i64,
    pub t_end: i64,
}

impl From<&FrameReport> for FrameRow {
    fn from(report: &FrameReport) -> Self {
        let [p, qrs, t] = report.segments.as_pairs();
        Self {
            frame: report.frame,
            time_ms: report.time_ms,
            index: report.index.get(),
            raw: report.raw,
            value: report.value,
            phase: report.phase.label().to_string(),
            bpm: report.bpm,
            p_start: p.0,
            p_end: p.1,
            qrs_start: qrs.0,
            qrs_end: qrs.1,
            t_start: t.0,
            t_end: t.1,
        }
    }
}

/// Totals over a simulated run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub patient: usize,
    pub label: String,
    pub speed: f64,
    pub frames: u64,
    pub processed: u64,
    pub skipped: u64,
    pub paused: u64,
    pub detections: u64,
    pub phase_changes: u64,
    pub beats: u64,
    pub fallbacks: u64,
    pub placeholders: u64,
    /// Processed frames per phase label.
    pub phases: BTreeMap<String, u64>,
    pub final_bpm: Option<u32>,
}

impl SessionSummary {
    pub fn new(patient: usize, label: &str, speed: f64) -> Self {
        Self {
            patient,
            label: label.to_string(),
            speed,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        let report = match outcome {
            FrameOutcome::Paused => {
                self.paused += 1;
                return;
            }
            FrameOutcome::Skipped => {
                self.skipped += 1;
                return;
            }
            FrameOutcome::Advanced(report) => report,
        };
        self.processed += 1;
        if report.detected {
            self.detections += 1;
        }
        if report.phase_change.is_some() {
            self.phase_changes += 1;
        }
        for event in &report.rate_events {
            match event {
                RateEvent::Beat { .. } => self.beats += 1,
                RateEvent::Fallback { .. } => self.fallbacks += 1,
                RateEvent::Placeholder { .. } => self.placeholders += 1,
            }
        }
        *self
            .phases
            .entry(report.phase.label().to_string())
            .or_default() += 1;
        self.final_bpm = report.bpm;
    }
}

pub fn write_frames_tsv(path: &Path, rows: &[FrameRow]) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating frame log {}", path.display()))?;
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &SessionSummary) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating summary {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)
        .with_context(|| format!("writing summary {}", path.display()))?;
    Ok(())
}
