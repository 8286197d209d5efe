use crate::signal::{Label, PatientRecord, CYCLE_LEN};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{debug, warn};
use serde_json::Value;
use std::{fs, io::Read, path::Path};
use thiserror::Error;

/// Loader cap on the number of patients kept from a file.
pub const MAX_PATIENTS: usize = 50;

/// Waveforms with any sample beyond this magnitude are rescaled into `[0, 1]`.
const RAW_LIMIT: f64 = 10.0;

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset contains no patients")]
    Empty,
    #[error("patient index {index} out of range (dataset has {len} patients)")]
    OutOfRange { index: usize, len: usize },
    #[error("record {record}: missing sample \"{column}\"")]
    MissingSample { record: usize, column: usize },
    #[error("record {record}: sample \"{column}\" is not numeric")]
    NonNumeric { record: usize, column: usize },
    #[error("JSON dataset must be an array of patient objects")]
    NotAnArray,
}

/// Ordered, non-empty list of selectable patients.
#[derive(Debug, Clone)]
pub struct Dataset {
    patients: Vec<PatientRecord>,
}

impl Dataset {
    pub fn new(patients: Vec<PatientRecord>) -> Result<Self, DatasetError> {
        if patients.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(Self { patients })
    }

    /// Caller guarantees `patients` is non-empty.
    pub(crate) fn from_nonempty(patients: Vec<PatientRecord>) -> Self {
        debug_assert!(!patients.is_empty());
        Self { patients }
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn patients(&self) -> &[PatientRecord] {
        &self.patients
    }

    pub fn get(&self, index: usize) -> Result<&PatientRecord, DatasetError> {
        self.patients.get(index).ok_or(DatasetError::OutOfRange {
            index,
            len: self.patients.len(),
        })
    }

    /// Patient selector entries, e.g. `Patient 3 (Abnormal)`.
    pub fn selector_entries(&self) -> Vec<String> {
        self.patients
            .iter()
            .enumerate()
            .map(|(i, p)| p.selector_label(i))
            .collect()
    }
}

/// Rescale into `[0, 1]` when the recording is clearly not in display units.
fn rescale_if_out_of_range(samples: &mut [f64]) {
    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if (max > RAW_LIMIT || min < -RAW_LIMIT) && max > min {
        for v in samples.iter_mut() {
            *v = (*v - min) / (max - min);
        }
    }
}

/// Parse a CSV dataset with sample columns `0`..`139`, `label` and an
/// optional `heartRate`. Unnamed sample columns fall back to their position.
pub fn parse_csv_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let sample_cols: Vec<usize> = (0..CYCLE_LEN)
        .map(|i| column(&i.to_string()).unwrap_or(i))
        .collect();
    let label_col = column("label");
    let rate_col = column("heartRate");

    let mut patients = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading record {}", row + 1))?;
        let mut samples = Vec::with_capacity(CYCLE_LEN);
        for (i, &col) in sample_cols.iter().enumerate() {
            let value = match record.get(col).map(str::parse::<f64>) {
                Some(Ok(v)) => v,
                _ => {
                    warn!("record {}: sample {} unreadable, using 0.0", row + 1, i);
                    0.0
                }
            };
            samples.push(value);
        }
        rescale_if_out_of_range(&mut samples);
        let label = label_col
            .and_then(|c| record.get(c))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| Label::from_code(v as i64))
            .unwrap_or_default();
        let mut patient = PatientRecord::new(samples, label);
        patient.heart_rate = rate_col
            .and_then(|c| record.get(c))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as u32);
        patients.push(patient);
        if patients.len() >= MAX_PATIENTS {
            debug!("dataset truncated to {} patients", MAX_PATIENTS);
            break;
        }
    }
    Ok(Dataset::new(patients)?)
}

pub fn read_csv_dataset(path: &Path) -> Result<Dataset> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_csv_dataset(file).with_context(|| format!("parsing dataset {}", path.display()))
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the JSON wire format: an array of objects keyed `"0"`..`"139"`.
pub fn parse_json_dataset(text: &str) -> Result<Dataset> {
    let value: Value = serde_json::from_str(text).context("parsing JSON dataset")?;
    let records = value.as_array().ok_or(DatasetError::NotAnArray)?;
    let mut patients = Vec::with_capacity(records.len().min(MAX_PATIENTS));
    for (record, entry) in records.iter().take(MAX_PATIENTS).enumerate() {
        let mut samples = Vec::with_capacity(CYCLE_LEN);
        for column in 0..CYCLE_LEN {
            let raw = entry
                .get(column.to_string())
                .ok_or(DatasetError::MissingSample { record, column })?;
            samples.push(json_number(raw).ok_or(DatasetError::NonNumeric { record, column })?);
        }
        let label = entry
            .get("label")
            .and_then(json_number)
            .map(|v| Label::from_code(v as i64))
            .unwrap_or_default();
        let mut patient = PatientRecord::new(samples, label);
        patient.heart_rate = entry.get("heartRate").and_then(json_number).map(|v| v as u32);
        patients.push(patient);
    }
    Ok(Dataset::new(patients)?)
}

pub fn read_json_dataset(path: &Path) -> Result<Dataset> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_json_dataset(&text).with_context(|| format!("parsing dataset {}", path.display()))
}

/// Pick the loader from the file extension; anything but `.json` is CSV.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => read_json_dataset(path),
        _ => read_csv_dataset(path),
    }
}

pub fn write_csv_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    let mut header: Vec<String> = (0..CYCLE_LEN).map(|i| i.to_string()).collect();
    header.push("label".into());
    header.push("heartRate".into());
    writer.write_record(&header)?;
    for patient in dataset.patients() {
        let mut row: Vec<String> = patient
            .waveform
            .samples()
            .iter()
            .map(|v| v.to_string())
            .collect();
        row.push(patient.label.code().to_string());
        row.push(
            patient
                .heart_rate
                .map(|v| v.to_string())
                .unwrap_or_default(),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
