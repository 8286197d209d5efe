//! Deterministic synthetic ECG patients for demos and tests.

use crate::{
    io::dataset::Dataset,
    signal::{Label, PatientRecord, CYCLE_LEN},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

/// Rhythm disorders modelled by the abnormal synthetic patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abnormality {
    AtrialFibrillation,
    StElevation,
    VentricularTachycardia,
    CompleteHeartBlock,
    LongQt,
}

impl Abnormality {
    pub const ALL: [Abnormality; 5] = [
        Abnormality::AtrialFibrillation,
        Abnormality::StElevation,
        Abnormality::VentricularTachycardia,
        Abnormality::CompleteHeartBlock,
        Abnormality::LongQt,
    ];
}

fn gauss(t: f64, center: f64, sigma: f64, amp: f64) -> f64 {
    amp * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp()
}

/// Zero-mean Gaussian noise with standard deviation `sd`.
fn noise(rng: &mut StdRng, sd: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    sd * z
}

/// Q, R and S deflections around `qrs`.
fn qrs_complex(t: f64, qrs: f64, s_amp: f64) -> f64 {
    let w = 0.02 / 3.0;
    gauss(t, qrs - 0.04, w, -0.1) + gauss(t, qrs, w, 1.0) + gauss(t, qrs + 0.04, w, s_amp)
}

fn time_axis(cycle: f64) -> Vec<f64> {
    let span = cycle * 1.5;
    (0..CYCLE_LEN)
        .map(|i| span * i as f64 / (CYCLE_LEN - 1) as f64)
        .collect()
}

fn normal_beat(t: &[f64], cycle: f64, rng: &mut StdRng) -> Vec<f64> {
    let qrs = cycle * 0.4;
    t.iter()
        .map(|&t| {
            gauss(t, cycle * 0.2, 0.08 / 5.0, 0.15)
                + qrs_complex(t, qrs, -0.3)
                + gauss(t, qrs + 0.24, 0.16 / 5.0, 0.3)
                + 0.05 * (2.0 * PI * 0.3 * t).sin()
                + noise(rng, 0.01)
        })
        .collect()
}

fn abnormal_beat(kind: Abnormality, t: &[f64], cycle: f64, rng: &mut StdRng) -> Vec<f64> {
    let qrs = cycle * 0.4;
    let mut signal: Vec<f64> = match kind {
        Abnormality::AtrialFibrillation => t
            .iter()
            .map(|&t| {
                let r_time = cycle * (0.4 + 0.2 * (10.0 * t).sin());
                gauss(t, r_time, 0.02, 1.0)
                    + 0.1 * (50.0 * t).sin()
                    + 0.1 * (30.0 * t + PI / 4.0).sin()
                    + gauss(t, r_time + 0.16, 0.16 / 5.0, 0.3)
            })
            .collect(),
        Abnormality::StElevation => t
            .iter()
            .map(|&t| {
                let st = if t >= qrs + 0.06 && t <= qrs + 0.25 { 0.3 } else { 0.0 };
                gauss(t, cycle * 0.2, 0.08 / 5.0, 0.15)
                    + qrs_complex(t, qrs, -0.2)
                    + st
                    + gauss(t, qrs + 0.3, 0.18 / 5.0, 0.4)
            })
            .collect(),
        Abnormality::VentricularTachycardia => {
            let vt_cycle = 60.0 / 150.0;
            let width = 0.16;
            let mut out = vec![0.0; t.len()];
            for beat in 0..3 {
                let start = beat as f64 * vt_cycle / 2.0;
                let center = start + 0.15;
                for (v, &t) in out.iter_mut().zip(t) {
                    let d = (t - center).abs();
                    if t > start && t < start + vt_cycle / 2.0 && d < width / 2.0 {
                        let shape = if beat % 2 == 0 {
                            (PI * d / width).sin()
                        } else {
                            (PI * d / width).cos()
                        };
                        *v += 1.2 * shape;
                    }
                }
            }
            for v in out.iter_mut() {
                *v += noise(rng, 0.05);
            }
            out
        }
        Abnormality::CompleteHeartBlock => t
            .iter()
            .map(|&t| {
                let atrial: f64 = (0..3)
                    .map(|i| gauss(t, i as f64 * 0.4 + 0.1, 0.08 / 5.0, 0.2))
                    .sum();
                let ventricular: f64 = (0..2)
                    .map(|i| {
                        let qrs = i as f64 * 0.75 + 0.2;
                        qrs_complex(t, qrs, -0.3) + gauss(t, qrs + 0.24, 0.16 / 5.0, 0.3)
                    })
                    .sum();
                atrial + ventricular
            })
            .collect(),
        Abnormality::LongQt => t
            .iter()
            .map(|&t| {
                let st = if t >= qrs + 0.06 && t <= qrs + 0.25 { 0.05 } else { 0.0 };
                let t_center = qrs + 0.35;
                gauss(t, cycle * 0.2, 0.08 / 5.0, 0.15)
                    + qrs_complex(t, qrs, -0.3)
                    + st
                    + gauss(t, t_center - 0.05, 0.2 / 8.0, 0.15)
                    + gauss(t, t_center, 0.2 / 8.0, 0.2)
            })
            .collect(),
    };
    for v in signal.iter_mut() {
        *v += noise(rng, 0.03);
    }
    signal
}

/// Shift to zero and scale the peak to one.
fn unit_scale(signal: &mut [f64]) {
    let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
    for v in signal.iter_mut() {
        *v -= min;
    }
    let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        for v in signal.iter_mut() {
            *v /= max;
        }
    }
}

/// One synthetic patient. `None` yields a normal sinus beat.
pub fn synthetic_patient(abnormality: Option<Abnormality>, rng: &mut StdRng) -> PatientRecord {
    let mut heart_rate: u32 = rng.gen_range(60..90);
    let cycle = 60.0 / heart_rate as f64;
    let t = time_axis(cycle);
    let mut signal = match abnormality {
        None => normal_beat(&t, cycle, rng),
        Some(kind) => {
            if kind == Abnormality::VentricularTachycardia {
                heart_rate = 150;
            }
            abnormal_beat(kind, &t, cycle, rng)
        }
    };
    unit_scale(&mut signal);
    let label = if abnormality.is_some() {
        Label::Abnormal
    } else {
        Label::Normal
    };
    PatientRecord::new(signal, label).with_heart_rate(heart_rate)
}

/// Five normal patients followed by one of each abnormality.
pub fn synthetic_dataset(seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut patients: Vec<PatientRecord> =
        (0..5).map(|_| synthetic_patient(None, &mut rng)).collect();
    for kind in Abnormality::ALL {
        patients.push(synthetic_patient(Some(kind), &mut rng));
    }
    Dataset::from_nonempty(patients)
}
