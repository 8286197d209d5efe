use serde::{Deserialize, Serialize};

/// Number of samples in one waveform cycle. Cyclic indices wrap modulo this.
pub const CYCLE_LEN: usize = 140;

/// Position inside one waveform cycle, always in `[0, CYCLE_LEN)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleIndex(usize);

impl CycleIndex {
    pub fn new(raw: usize) -> Self {
        Self(raw % CYCLE_LEN)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn next(self) -> Self {
        Self::new(self.0 + 1)
    }

    /// Wraps backwards, so the predecessor of 0 is 139.
    pub fn prev(self) -> Self {
        Self::new(self.0 + CYCLE_LEN - 1)
    }

    /// Walk `offset` samples forward with wrap-around.
    pub fn offset(self, offset: usize) -> Self {
        Self::new(self.0 + offset)
    }
}

/// Position inside the sliding sample buffer, `0` being the oldest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferIndex(pub usize);

impl BufferIndex {
    /// Buffer positions are read as cycle positions modulo the cycle length.
    /// No offset between the two spaces is applied.
    pub fn as_cycle(self) -> CycleIndex {
        CycleIndex::new(self.0)
    }
}

/// Diagnostic label attached to a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Label {
    #[default]
    Normal,
    Abnormal,
}

impl Label {
    /// Dataset encoding: 0 is normal, anything else abnormal.
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Label::Normal
        } else {
            Label::Abnormal
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Label::Normal => 0,
            Label::Abnormal => 1,
        }
    }

    pub fn is_abnormal(self) -> bool {
        self == Label::Abnormal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Abnormal => "Abnormal",
        }
    }
}

/// One periodic ECG cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    samples: Vec<f64>,
}

impl Waveform {
    /// Pads with zeros or truncates so the cycle is exactly `CYCLE_LEN` long.
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.resize(CYCLE_LEN, 0.0);
        Self { samples }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn at(&self, index: CycleIndex) -> f64 {
        self.samples[index.get()]
    }

    pub fn min_max(&self) -> (f64, f64) {
        self.samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Min-max scaled value of the sample at `index`. A flat cycle maps to 0.
    pub fn normalized_at(&self, index: CycleIndex) -> f64 {
        let (min, max) = self.min_max();
        let range = max - min;
        if range <= 0.0 {
            return 0.0;
        }
        (self.at(index) - min) / range
    }
}

/// A selectable patient: one waveform cycle plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub waveform: Waveform,
    pub label: Label,
    /// Baseline heart rate used by the rate fallback.
    pub heart_rate: Option<u32>,
}

impl PatientRecord {
    pub fn new(samples: Vec<f64>, label: Label) -> Self {
        Self {
            waveform: Waveform::from_samples(samples),
            label,
            heart_rate: None,
        }
    }

    pub fn with_heart_rate(mut self, heart_rate: u32) -> Self {
        self.heart_rate = Some(heart_rate);
        self
    }

    /// Entry text for the patient selector; `position` is zero based.
    pub fn selector_label(&self, position: usize) -> String {
        format!("Patient {} ({})", position + 1, self.label.as_str())
    }
}
