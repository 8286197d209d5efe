use crate::{
    detectors::ecg::{Segment, Segments},
    signal::CycleIndex,
};
use serde::{Deserialize, Serialize};

/// Discrete cardiac phase driving the chamber animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CardiacPhase {
    #[default]
    Diastole,
    AtrialSystole,
    VentricularSystole,
    VentricularRepolarization,
}

impl CardiacPhase {
    pub fn label(self) -> &'static str {
        match self {
            CardiacPhase::Diastole => "Diastole",
            CardiacPhase::AtrialSystole => "Atrial Systole",
            CardiacPhase::VentricularSystole => "Ventricular Systole",
            CardiacPhase::VentricularRepolarization => "Ventricular Repolarization",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CardiacPhase::Diastole => "Heart relaxed, filling with blood",
            CardiacPhase::AtrialSystole => "Atria contract, pushing blood to ventricles",
            CardiacPhase::VentricularSystole => "Ventricles contract, pumping blood to body/lungs",
            CardiacPhase::VentricularRepolarization => "Ventricles relaxing, preparing for filling",
        }
    }
}

/// Map a cycle position onto a phase. P beats QRS beats T when intervals overlap.
pub fn classify_phase(index: CycleIndex, segments: &Segments) -> CardiacPhase {
    let within = |seg: Option<Segment>| seg.map_or(false, |s| s.contains(index));
    if within(segments.p) {
        CardiacPhase::AtrialSystole
    } else if within(segments.qrs) {
        CardiacPhase::VentricularSystole
    } else if within(segments.t) {
        CardiacPhase::VentricularRepolarization
    } else {
        CardiacPhase::Diastole
    }
}

/// Notification emitted when the active phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    pub phase: CardiacPhase,
    pub label: &'static str,
    pub description: &'static str,
}

impl From<CardiacPhase> for PhaseChange {
    fn from(phase: CardiacPhase) -> Self {
        Self {
            phase,
            label: phase.label(),
            description: phase.description(),
        }
    }
}

/// Remembers the active phase so only transitions are reported.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    current: CardiacPhase,
}

impl PhaseTracker {
    pub fn current(&self) -> CardiacPhase {
        self.current
    }

    pub fn update(&mut self, index: CycleIndex, segments: &Segments) -> Option<PhaseChange> {
        let phase = classify_phase(index, segments);
        if phase == self.current {
            return None;
        }
        self.current = phase;
        Some(phase.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Segments {
        Segments {
            p: Some(Segment::new(2, 6)),
            qrs: Some(Segment::new(9, 14)),
            t: Some(Segment::new(18, 24)),
        }
    }

    #[test]
    fn classifies_each_interval() {
        let seg = segments();
        assert_eq!(classify_phase(CycleIndex::new(4), &seg), CardiacPhase::AtrialSystole);
        assert_eq!(classify_phase(CycleIndex::new(9), &seg), CardiacPhase::VentricularSystole);
        assert_eq!(classify_phase(CycleIndex::new(24), &seg), CardiacPhase::VentricularRepolarization);
        assert_eq!(classify_phase(CycleIndex::new(30), &seg), CardiacPhase::Diastole);
    }

    #[test]
    fn p_wins_over_overlapping_qrs() {
        let seg = Segments {
            p: Some(Segment::new(5, 12)),
            qrs: Some(Segment::new(10, 15)),
            t: None,
        };
        assert_eq!(classify_phase(CycleIndex::new(11), &seg), CardiacPhase::AtrialSystole);
    }

    #[test]
    fn undetected_segments_mean_diastole() {
        let seg = Segments::undetected();
        for i in 0..crate::signal::CYCLE_LEN {
            assert_eq!(classify_phase(CycleIndex::new(i), &seg), CardiacPhase::Diastole);
        }
    }

    #[test]
    fn tracker_reports_only_transitions() {
        let seg = segments();
        let mut tracker = PhaseTracker::default();
        assert_eq!(tracker.update(CycleIndex::new(0), &seg), None);
        let change = tracker.update(CycleIndex::new(3), &seg).expect("change");
        assert_eq!(change.phase, CardiacPhase::AtrialSystole);
        assert_eq!(change.description, "Atria contract, pushing blood to ventricles");
        assert_eq!(tracker.update(CycleIndex::new(4), &seg), None);
    }
}
