use crate::{
    detectors::ecg::{Segment, Segments},
    signal::{CycleIndex, Waveform, CYCLE_LEN},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const TRACE: Color = Color(0xC8C8C8);
    pub const P_WAVE: Color = Color(0x0078FF);
    pub const QRS: Color = Color(0xFF3232);
    pub const T_WAVE: Color = Color(0x00DC00);
    pub const GRID_MAJOR: Color = Color(0x3C3C3C);
    pub const GRID_MINOR: Color = Color(0x323232);

    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Axis-aligned grid lines in canvas pixels, each `[from, to]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    pub major: Vec<[[f64; 2]; 2]>,
    pub minor: Vec<[[f64; 2]; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: Color,
}

/// Canvas-space point of the trace and the cycle sample it came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TracePoint {
    pub x: f64,
    pub y: f64,
    pub index: CycleIndex,
}

/// Everything the drawing surface needs for one ECG frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgTrace {
    pub width: f64,
    pub height: f64,
    pub grid: Grid,
    pub points: Vec<TracePoint>,
    /// Full trace first, then one polyline per detected wave.
    pub series: Vec<LineSeries>,
    pub labels: Vec<TraceLabel>,
}

/// 2D canvas the trace is drawn on.
pub trait DrawingSurface {
    fn clear(&mut self, width: f64, height: f64) -> anyhow::Result<()>;
    fn grid(&mut self, grid: &Grid) -> anyhow::Result<()>;
    fn polyline(&mut self, series: &LineSeries) -> anyhow::Result<()>;
    fn label(&mut self, label: &TraceLabel) -> anyhow::Result<()>;
}

pub fn draw_trace<S: DrawingSurface + ?Sized>(surface: &mut S, trace: &EcgTrace) -> anyhow::Result<()> {
    surface.clear(trace.width, trace.height)?;
    surface.grid(&trace.grid)?;
    for series in &trace.series {
        surface.polyline(series)?;
    }
    for label in &trace.labels {
        surface.label(label)?;
    }
    Ok(())
}

pub fn grid_lines(width: f64, height: f64, major: f64, minor: f64) -> Grid {
    let lines = |step: f64| {
        let mut out = Vec::new();
        let mut x = 0.0;
        while x < width {
            out.push([[x, 0.0], [x, height]]);
            x += step;
        }
        let mut y = 0.0;
        while y < height {
            out.push([[0.0, y], [width, y]]);
            y += step;
        }
        out
    };
    Grid {
        major: lines(major.max(1.0)),
        minor: lines(minor.max(1.0)),
    }
}

/// Lay out one full cycle starting at `current`, colour the detected waves and
/// place the P/Q/R/S/T labels.
pub fn build_trace(
    waveform: &Waveform,
    current: CycleIndex,
    segments: &Segments,
    normalize: bool,
    width: f64,
    height: f64,
) -> EcgTrace {
    let points: Vec<TracePoint> = (0..CYCLE_LEN)
        .map(|i| {
            let index = current.offset(i);
            let v = if normalize {
                waveform.normalized_at(index)
            } else {
                waveform.at(index)
            };
            TracePoint {
                x: i as f64 / CYCLE_LEN as f64 * width,
                y: height - (v * height * 0.6 + height * 0.2),
                index,
            }
        })
        .collect();

    let mut series = vec![LineSeries {
        name: "ECG".into(),
        points: points.iter().map(|p| [p.x, p.y]).collect(),
        style: Style {
            width: 1.5,
            color: Color::TRACE,
        },
    }];
    let mut labels = Vec::new();
    let lookup = |i: usize| points.iter().find(|p| p.index == CycleIndex::new(i));
    let label = |text: &str, p: &TracePoint, dx: f64, dy: f64, color: Color| TraceLabel {
        text: text.into(),
        x: p.x + dx,
        y: p.y + dy,
        color,
    };

    // Smallest y is the visual apex since the canvas y axis points down.
    let apex = |seg: &Segment, from: usize| {
        let mut best: Option<(usize, f64)> = None;
        for i in from..=seg.end.0 {
            if let Some(p) = lookup(i) {
                if best.map_or(true, |(_, y)| p.y < y) {
                    best = Some((i, p.y));
                }
            }
        }
        best.map(|(i, _)| i).unwrap_or(from)
    };

    if let Some(p_seg) = segments.p {
        let peak = apex(&p_seg, p_seg.start.0);
        if let Some(pos) = lookup(peak) {
            labels.push(label("P", pos, 0.0, -10.0, Color::P_WAVE));
        }
        series.push(wave_series("P", &points, &p_seg, Color::P_WAVE));
    }

    if let Some(t_seg) = segments.t {
        let peak = apex(&t_seg, t_seg.start.0);
        if let Some(pos) = lookup(peak) {
            labels.push(label("T", pos, -5.0, -10.0, Color::T_WAVE));
        }
        series.push(wave_series("T", &points, &t_seg, Color::T_WAVE));
    }

    if let Some(qrs) = segments.qrs {
        if let Some(pos) = lookup(qrs.start.0) {
            labels.push(label("Q", pos, -5.0, 20.0, Color::QRS));
        }
        let r = apex(&qrs, qrs.start.0);
        if let Some(pos) = lookup(r) {
            labels.push(label("R", pos, -5.0, -10.0, Color::QRS));
        }
        let mut s = r;
        let mut lowest = f64::NEG_INFINITY;
        for i in r + 1..=qrs.end.0 {
            if let Some(p) = lookup(i) {
                if p.y > lowest {
                    lowest = p.y;
                    s = i;
                }
            }
        }
        if let Some(pos) = lookup(s) {
            labels.push(label("S", pos, -5.0, 20.0, Color::QRS));
        }
        series.push(wave_series("QRS", &points, &qrs, Color::QRS));
    }

    EcgTrace {
        width,
        height,
        grid: grid_lines(width, height, 50.0, 10.0),
        points,
        series,
        labels,
    }
}

fn wave_series(name: &str, points: &[TracePoint], seg: &Segment, color: Color) -> LineSeries {
    LineSeries {
        name: name.into(),
        points: points
            .iter()
            .filter(|p| seg.contains(p.index))
            .map(|p| [p.x, p.y])
            .collect(),
        style: Style { width: 2.0, color },
    }
}
