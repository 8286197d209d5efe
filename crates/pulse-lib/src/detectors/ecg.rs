use crate::{
    buffer::{SampleBuffer, BUFFER_CAPACITY},
    signal::{BufferIndex, CycleIndex},
};
use serde::{Deserialize, Serialize};

/// Tunables for P/QRS/T segmentation over the sample buffer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Detection is skipped until the buffer holds this many samples.
    pub min_samples: usize,
    /// Fractions of the buffer range added to the mean to form each threshold.
    pub r_threshold: f64,
    pub p_threshold: f64,
    pub t_threshold: f64,
    /// Samples ignored at each buffer edge when looking for the R peak.
    pub r_edge_margin: usize,
    /// How far Q and S may be from R.
    pub qs_search: usize,
    /// Maximum expansion of a wave around its apex.
    pub wave_expand: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_samples: BUFFER_CAPACITY,
            r_threshold: 0.6,
            p_threshold: 0.15,
            t_threshold: 0.25,
            r_edge_margin: 5,
            qs_search: 5,
            wave_expand: 10,
        }
    }
}

/// Closed interval `[start, end]` of buffer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: BufferIndex,
    pub end: BufferIndex,
}

impl Segment {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: BufferIndex(start),
            end: BufferIndex(end),
        }
    }

    /// Whether a cycle position falls inside the interval once buffer
    /// positions are read as cycle positions.
    pub fn contains(&self, index: CycleIndex) -> bool {
        let start = self.start.as_cycle();
        let end = self.end.as_cycle();
        start <= index && index <= end
    }
}

/// The three wave intervals of one detection cycle. `None` means undetected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segments {
    pub p: Option<Segment>,
    pub qrs: Option<Segment>,
    pub t: Option<Segment>,
}

impl Segments {
    pub fn undetected() -> Self {
        Self::default()
    }

    pub fn is_undetected(&self) -> bool {
        self.p.is_none() && self.qrs.is_none() && self.t.is_none()
    }

    /// Legacy `(start, end)` encoding where `(-1, -1)` marks an undetected wave.
    pub fn as_pairs(&self) -> [(i64, i64); 3] {
        let pair = |seg: Option<Segment>| {
            seg.map(|s| (s.start.0 as i64, s.end.0 as i64))
                .unwrap_or((-1, -1))
        };
        [pair(self.p), pair(self.qrs), pair(self.t)]
    }
}

/// Locate P, QRS and T within `values` (oldest first).
///
/// Returns `None` when the window is too short or holds no R peak above
/// threshold; callers keep their previous segments in that case.
pub fn detect_segments(values: &[f64], cfg: &SegmentConfig) -> Option<Segments> {
    let n = values.len();
    if n < cfg.min_samples.max(1) {
        return None;
    }

    let stats = WindowStats::of(values);
    let r_thr = stats.avg + stats.range * cfg.r_threshold;
    let p_thr = stats.avg + stats.range * cfg.p_threshold;
    let t_thr = stats.avg + stats.range * cfg.t_threshold;

    let r = find_r_peak(values, r_thr, cfg.r_edge_margin)?;

    let mut q = r;
    for i in (r.saturating_sub(cfg.qs_search)..r).rev() {
        if values[i] < values[i + 1] && values[i] < stats.avg {
            q = i;
            break;
        }
    }

    let mut s = r;
    for i in r + 1..n.min(r + cfg.qs_search) {
        if values[i] < values[i - 1] && values[i] < stats.avg {
            s = i;
            break;
        }
    }

    let qrs_start = q.saturating_sub(1);
    let qrs_end = (s + 2).min(n - 1);

    let p = match find_apex(
        values,
        qrs_start.saturating_sub(15),
        qrs_start.saturating_sub(3),
        p_thr,
    ) {
        Some(apex) => expand_wave(values, apex, stats.avg, cfg.wave_expand),
        None => Segment::new(qrs_start.saturating_sub(15), qrs_start.saturating_sub(5)),
    };

    let t = match find_apex(
        values,
        (qrs_end + 5).min(n - 1),
        (qrs_end + 20).min(n - 1),
        t_thr,
    ) {
        Some(apex) => {
            let wave = expand_wave(values, apex, stats.avg, cfg.wave_expand);
            Segment::new(wave.start.0.max(qrs_end), wave.end.0)
        }
        None => Segment::new((qrs_end + 5).min(n - 1), (qrs_end + 15).min(n - 1)),
    };

    Some(Segments {
        p: Some(p),
        qrs: Some(Segment::new(qrs_start, qrs_end)),
        t: Some(t),
    })
}

struct WindowStats {
    avg: f64,
    range: f64,
}

impl WindowStats {
    fn of(values: &[f64]) -> Self {
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Self {
            avg,
            range: max - min,
        }
    }
}

/// Highest sample above `threshold`, ignoring `margin` samples at each edge.
fn find_r_peak(values: &[f64], threshold: f64, margin: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in margin..values.len().saturating_sub(margin) {
        let v = values[i];
        if v > threshold && best.map_or(true, |(_, top)| v > top) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Highest strict local maximum above `threshold` inside `[lo, hi]`.
fn find_apex(values: &[f64], lo: usize, hi: usize, threshold: f64) -> Option<usize> {
    let n = values.len();
    let mut best: Option<(usize, f64)> = None;
    for i in lo..=hi.min(n - 1) {
        let v = values[i];
        let local_max = i > 0 && i < n - 1 && v > values[i - 1] && v > values[i + 1];
        if local_max && v > threshold && best.map_or(true, |(_, top)| v > top) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Walk outwards from `apex` until a sample dips below `avg`.
fn expand_wave(values: &[f64], apex: usize, avg: f64, reach: usize) -> Segment {
    let n = values.len();
    let start = (apex.saturating_sub(reach)..=apex)
        .rev()
        .find(|&i| values[i] < avg)
        .unwrap_or(apex);
    let end = (apex..=(apex + reach).min(n - 1))
        .find(|&i| values[i] < avg)
        .unwrap_or(apex);
    Segment::new(start, end)
}

/// Stateful wrapper that keeps the last successful detection.
#[derive(Debug, Clone, Default)]
pub struct SegmentDetector {
    cfg: SegmentConfig,
    segments: Segments,
}

impl SegmentDetector {
    pub fn new(cfg: SegmentConfig) -> Self {
        Self {
            cfg,
            segments: Segments::undetected(),
        }
    }

    /// Recompute segments from the buffer. Returns whether a new detection was
    /// stored; a short buffer or a missing R peak keeps the previous result.
    pub fn update(&mut self, buffer: &SampleBuffer) -> bool {
        match detect_segments(&buffer.values(), &self.cfg) {
            Some(segments) => {
                self.segments = segments;
                true
            }
            None => false,
        }
    }

    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    pub fn reset(&mut self) {
        self.segments = Segments::undetected();
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat baseline with a small P bump, a sharp QRS and a broad T bump.
    fn beat_window() -> Vec<f64> {
        let mut v = vec![0.1; 30];
        v[6] = 0.3;
        v[7] = 0.4;
        v[8] = 0.3;
        v[11] = 0.0;
        v[12] = 1.0;
        v[13] = 0.0;
        v[19] = 0.35;
        v[20] = 0.45;
        v[21] = 0.35;
        v
    }

    #[test]
    fn short_buffer_is_a_noop() {
        let mut det = SegmentDetector::new(SegmentConfig::default());
        let mut buf = SampleBuffer::default();
        for v in beat_window() {
            buf.push(v);
        }
        assert!(det.update(&buf));
        let before = *det.segments();

        let mut short = SampleBuffer::default();
        for v in beat_window().into_iter().take(29) {
            short.push(v);
        }
        assert!(!det.update(&short));
        assert_eq!(*det.segments(), before);
    }

    #[test]
    fn locates_all_three_waves() {
        let seg = detect_segments(&beat_window(), &SegmentConfig::default()).expect("segments");
        assert_eq!(seg.qrs, Some(Segment::new(10, 15)));
        assert_eq!(seg.p, Some(Segment::new(5, 9)));
        assert_eq!(seg.t, Some(Segment::new(18, 22)));
    }

    #[test]
    fn qrs_contains_dominant_peak() {
        for peak in 5..25 {
            let mut v = vec![0.0; 30];
            v[peak] = 1.0;
            let seg = detect_segments(&v, &SegmentConfig::default()).expect("segments");
            let qrs = seg.qrs.expect("qrs");
            assert!(qrs.start.0 <= peak && peak <= qrs.end.0, "peak {peak}");
        }
    }

    #[test]
    fn missing_r_peak_aborts_detection() {
        let v = vec![0.5; 30];
        assert!(detect_segments(&v, &SegmentConfig::default()).is_none());
    }

    #[test]
    fn fallback_windows_when_waves_are_flat() {
        let mut v = vec![0.0; 30];
        v[20] = 1.0;
        let seg = detect_segments(&v, &SegmentConfig::default()).expect("segments");
        // Q and S sit right next to R; P and T fall back to fixed offsets.
        assert_eq!(seg.qrs, Some(Segment::new(18, 23)));
        assert_eq!(seg.p, Some(Segment::new(3, 13)));
        assert_eq!(seg.t, Some(Segment::new(28, 29)));
    }

    #[test]
    fn t_wave_never_starts_inside_qrs() {
        // A plateau above the mean joins S to the T apex.
        let mut v = vec![0.0; 30];
        v[10] = 1.0;
        for x in &mut v[12..=26] {
            *x = 0.3;
        }
        v[19] = 0.45;
        v[20] = 0.5;
        v[21] = 0.45;
        let seg = detect_segments(&v, &SegmentConfig::default()).expect("segments");
        assert_eq!(seg.qrs, Some(Segment::new(8, 13)));
        // the walk back from the apex reaches 11; the start is pulled up to QRS end
        assert_eq!(seg.t, Some(Segment::new(13, 27)));
    }

    #[test]
    fn wave_expansion_is_capped() {
        let mut v = vec![0.0; 30];
        for x in &mut v[1..=17] {
            *x = 0.3;
        }
        v[12] = 0.5;
        v[20] = 1.0;
        let seg = detect_segments(&v, &SegmentConfig::default()).expect("segments");
        assert_eq!(seg.qrs, Some(Segment::new(18, 23)));
        // no dip within ten samples before the apex, so the start stays on it
        assert_eq!(seg.p, Some(Segment::new(12, 18)));

        let wide = SegmentConfig {
            wave_expand: 12,
            ..SegmentConfig::default()
        };
        let seg = detect_segments(&v, &wide).expect("segments");
        assert_eq!(seg.p, Some(Segment::new(0, 18)));
    }

    #[test]
    fn undetected_pairs_use_negative_sentinel() {
        assert_eq!(Segments::undetected().as_pairs(), [(-1, -1); 3]);
    }
}
