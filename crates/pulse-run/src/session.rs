use crate::{
    clock::{Clock, SystemClock},
    config::PlaybackConfig,
};
use log::{debug, info};
use pulse_lib::{
    animation::{heart_pose, HeartPose, ParticleSystem, RenderSurface},
    io::{Dataset, DatasetError},
    plot::{build_trace, EcgTrace},
    CardiacPhase, CycleIndex, PatientRecord, PhaseChange, PhaseTracker, RateEstimator, RateEvent,
    SampleBuffer, SegmentDetector, Segments,
};
use serde::Serialize;

/// State computed for one processed sample.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// Display refreshes seen so far, including skipped ones.
    pub frame: u64,
    pub time_ms: u64,
    pub index: CycleIndex,
    pub raw: f64,
    /// Value handed to the animation and the trace.
    pub value: f64,
    pub phase: CardiacPhase,
    pub phase_change: Option<PhaseChange>,
    /// Whether segment detection ran and stored a fresh result this frame.
    pub detected: bool,
    pub segments: Segments,
    pub bpm: Option<u32>,
    pub rate_events: Vec<RateEvent>,
    pub pose: HeartPose,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Paused,
    /// Index moved on without processing; the previous state stays on screen.
    Skipped,
    Advanced(Box<FrameReport>),
}

/// Single-threaded playback of one dataset, driven by `tick()` once per
/// display refresh.
pub struct Session<C: Clock = SystemClock> {
    cfg: PlaybackConfig,
    clock: C,
    dataset: Dataset,
    patient: usize,
    record: PatientRecord,
    buffer: SampleBuffer,
    detector: SegmentDetector,
    phases: PhaseTracker,
    rate: RateEstimator,
    pending_rate_events: Vec<RateEvent>,
    particles: ParticleSystem,
    speed: f64,
    normalize: bool,
    playing: bool,
    index: CycleIndex,
    frames: u64,
    last: Option<FrameReport>,
}

impl<C: Clock> Session<C> {
    pub fn new(dataset: Dataset, cfg: PlaybackConfig, clock: C) -> Self {
        let now = clock.now_ms();
        let record = dataset.patients()[0].clone();
        info!(
            "session started with {} patients, speed {:.2}",
            dataset.len(),
            cfg.speed
        );
        Self {
            buffer: SampleBuffer::new(cfg.buffer_len()),
            detector: SegmentDetector::new(cfg.segments),
            phases: PhaseTracker::default(),
            rate: RateEstimator::new(cfg.rate, now),
            pending_rate_events: Vec::new(),
            particles: ParticleSystem::with_default_paths(cfg.particle_seed),
            speed: cfg.clamp_speed(cfg.speed),
            normalize: cfg.normalize,
            playing: cfg.autoplay,
            index: CycleIndex::default(),
            frames: 0,
            last: None,
            patient: 0,
            record,
            dataset,
            clock,
            cfg,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.cfg
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn patient_index(&self) -> usize {
        self.patient
    }

    pub fn patient(&self) -> &PatientRecord {
        &self.record
    }

    pub fn index(&self) -> CycleIndex {
        self.index
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn segments(&self) -> &Segments {
        self.detector.segments()
    }

    pub fn phase(&self) -> CardiacPhase {
        self.phases.current()
    }

    pub fn bpm(&self) -> Option<u32> {
        self.rate.displayed()
    }

    /// BPM readout as shown to the user.
    pub fn bpm_label(&self) -> String {
        match self.rate.displayed() {
            Some(bpm) => bpm.to_string(),
            None => "--".into(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn speed_label(&self) -> String {
        format!("{:.2}x", self.speed)
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn last_frame(&self) -> Option<&FrameReport> {
        self.last.as_ref()
    }

    pub fn play(&mut self) {
        if !self.playing {
            debug!("playback resumed at index {}", self.index.get());
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        if self.playing {
            debug!("playback paused at index {}", self.index.get());
        }
        self.playing = false;
    }

    pub fn toggle_normalize(&mut self) -> bool {
        self.normalize = !self.normalize;
        debug!("normalize {}", if self.normalize { "on" } else { "off" });
        self.normalize
    }

    /// Returns the clamped speed actually applied.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = self.cfg.clamp_speed(speed);
        info!("playback speed {}", self.speed_label());
        self.speed
    }

    /// Switch patient. Buffer, segments and cyclic index start over; the BPM
    /// and beat timing carry across.
    pub fn select_patient(&mut self, index: usize) -> Result<&PatientRecord, DatasetError> {
        let record = self.dataset.get(index)?.clone();
        info!("switching to {}", record.selector_label(index));
        self.patient = index;
        self.record = record;
        self.index = CycleIndex::default();
        self.buffer.clear();
        self.detector.reset();
        self.last = None;
        Ok(&self.record)
    }

    fn check_placeholder(&mut self, now: u64) {
        if let Some(event) = self.rate.check_placeholder(now, self.record.label, self.speed) {
            info!("no beat yet, showing placeholder {:?}", event);
            self.pending_rate_events.push(event);
        }
    }

    /// One display refresh.
    pub fn tick(&mut self) -> FrameOutcome {
        let now = self.clock.now_ms();
        self.frames += 1;
        self.check_placeholder(now);
        if !self.playing {
            return FrameOutcome::Paused;
        }

        let stride = self.cfg.frame_stride(self.speed);
        if self.index.get() % stride != 0 {
            self.index = self.index.next();
            return FrameOutcome::Skipped;
        }

        let index = self.index;
        let raw = self.record.waveform.at(index);
        self.buffer.push(raw);

        let detected = index.get() % self.cfg.detect_every.max(1) == 0
            && self.detector.update(&self.buffer);

        let value = if self.normalize {
            self.record.waveform.normalized_at(index)
        } else {
            raw
        };

        let phase_change = self.phases.update(index, self.detector.segments());
        if let Some(change) = &phase_change {
            debug!("phase -> {}: {}", change.label, change.description);
        }
        let phase = self.phases.current();
        let pose = heart_pose(phase, value, now);
        self.particles.advance(phase);

        let mut rate_events = std::mem::take(&mut self.pending_rate_events);
        if let Some(event) = self.rate.update(
            index,
            &self.record.waveform,
            self.speed,
            self.record.heart_rate,
            now,
        ) {
            if let RateEvent::Fallback { bpm } = event {
                info!("no beat for {} ms, falling back to {bpm} bpm", self.cfg.rate.fallback_after_ms);
            }
            rate_events.push(event);
        }

        let report = FrameReport {
            frame: self.frames,
            time_ms: now,
            index,
            raw,
            value,
            phase,
            phase_change,
            detected,
            segments: *self.detector.segments(),
            bpm: self.rate.displayed(),
            rate_events,
            pose,
        };
        self.index = index.next();
        self.last = Some(report.clone());
        FrameOutcome::Advanced(Box::new(report))
    }

    /// ECG trace for the last processed sample.
    pub fn trace(&self, width: f64, height: f64) -> EcgTrace {
        let current = self.last.as_ref().map(|r| r.index).unwrap_or(self.index);
        build_trace(
            &self.record.waveform,
            current,
            self.detector.segments(),
            self.normalize,
            width,
            height,
        )
    }

    /// Push the last pose and the particles to a renderer. Skipped frames call
    /// this too so the previous state is shown again.
    pub fn present<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        if let Some(report) = &self.last {
            surface.apply_pose(&report.pose);
        }
        surface.update_particles(self.particles.particles());
        surface.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pulse_lib::{
        animation::{PartCommand, Particle},
        io::synthetic_dataset,
        Label, CYCLE_LEN,
    };

    fn flat_patient(label: Label) -> PatientRecord {
        PatientRecord::new(vec![0.2; CYCLE_LEN], label)
    }

    fn fast_config() -> PlaybackConfig {
        PlaybackConfig {
            speed: 1.0,
            slow_factor: 1,
            ..PlaybackConfig::default()
        }
    }

    fn advanced(outcome: FrameOutcome) -> FrameReport {
        match outcome {
            FrameOutcome::Advanced(report) => *report,
            other => panic!("expected a processed frame, got {other:?}"),
        }
    }

    #[test]
    fn second_and_third_cycles_match() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(synthetic_dataset(4), fast_config(), clock.clone());
        let mut cycles: Vec<Vec<(CardiacPhase, Segments)>> = Vec::new();
        for _ in 0..3 {
            let mut cycle = Vec::with_capacity(CYCLE_LEN);
            for _ in 0..CYCLE_LEN {
                clock.advance(16);
                let report = advanced(session.tick());
                cycle.push((report.phase, report.segments));
            }
            cycles.push(cycle);
        }
        assert_eq!(cycles[1], cycles[2]);
        assert!(cycles[1].iter().any(|(phase, _)| *phase != CardiacPhase::Diastole));
    }

    #[test]
    fn patient_switch_resets_analysis_state() {
        let clock = ManualClock::new(0);
        let mut session = Session::new(synthetic_dataset(4), fast_config(), clock.clone());
        for _ in 0..47 {
            clock.advance(16);
            session.tick();
        }
        assert!(!session.segments().is_undetected());

        session.select_patient(6).unwrap();
        assert_eq!(session.index().get(), 0);
        assert!(session.buffer().is_empty());
        assert!(session.segments().is_undetected());

        // index 0 is a detection index, but one sample is not enough
        let report = advanced(session.tick());
        assert_eq!(report.index.get(), 0);
        assert!(!report.detected);
        assert!(report.segments.is_undetected());
        assert_eq!(report.phase, CardiacPhase::Diastole);
    }

    #[test]
    fn bpm_survives_patient_switch() {
        let clock = ManualClock::new(0);
        let ds = Dataset::new(vec![flat_patient(Label::Normal), flat_patient(Label::Abnormal)]).unwrap();
        let mut session = Session::new(ds, fast_config(), clock.clone());
        session.tick();
        clock.advance(3001);
        session.tick();
        assert_eq!(session.bpm(), Some(75));
        session.select_patient(1).unwrap();
        assert_eq!(session.bpm(), Some(75));
        assert!(session.select_patient(2).is_err());
        assert_eq!(session.patient_index(), 1);
    }

    #[test]
    fn falls_back_to_baseline_without_beats() {
        let clock = ManualClock::new(0);
        let ds = Dataset::new(vec![flat_patient(Label::Normal)]).unwrap();
        let mut session = Session::new(ds, fast_config(), clock.clone());
        assert_eq!(session.bpm_label(), "--");
        advanced(session.tick());
        clock.advance(3001);
        let report = advanced(session.tick());
        assert!(report.rate_events.contains(&RateEvent::Fallback { bpm: 75 }));
        assert_eq!(report.bpm, Some(75));
        assert_eq!(session.bpm_label(), "75");
    }

    #[test]
    fn placeholder_uses_label_default() {
        let clock = ManualClock::new(0);
        let ds = Dataset::new(vec![flat_patient(Label::Abnormal)]).unwrap();
        let cfg = PlaybackConfig {
            autoplay: false,
            ..fast_config()
        };
        let mut session = Session::new(ds, cfg, clock.clone());
        clock.advance(2000);
        assert!(matches!(session.tick(), FrameOutcome::Paused));
        assert_eq!(session.bpm(), Some(95));

        session.play();
        let report = advanced(session.tick());
        assert_eq!(report.rate_events, vec![RateEvent::Placeholder { bpm: 95 }]);
    }

    #[test]
    fn frames_are_skipped_by_stride() {
        let clock = ManualClock::new(0);
        // speed 0.5 with slow factor 2 processes every fourth refresh
        let cfg = PlaybackConfig {
            speed: 0.5,
            ..PlaybackConfig::default()
        };
        let mut session = Session::new(synthetic_dataset(1), cfg, clock);
        let processed: Vec<usize> = (0..12)
            .filter_map(|_| match session.tick() {
                FrameOutcome::Advanced(r) => Some(r.index.get()),
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![0, 4, 8]);
        assert_eq!(session.index().get(), 12);
    }

    #[test]
    fn pause_freezes_index() {
        let mut session = Session::new(synthetic_dataset(1), fast_config(), ManualClock::new(0));
        session.tick();
        session.pause();
        for _ in 0..5 {
            assert!(matches!(session.tick(), FrameOutcome::Paused));
        }
        assert_eq!(session.index().get(), 1);
        session.play();
        assert_eq!(advanced(session.tick()).index.get(), 1);
    }

    #[test]
    fn controls_clamp_and_toggle() {
        let mut session = Session::new(synthetic_dataset(1), fast_config(), ManualClock::new(0));
        assert_eq!(session.set_speed(9.0), 4.0);
        assert_eq!(session.speed_label(), "4.00x");
        assert_eq!(session.set_speed(0.01), 0.05);
        assert!(session.normalize());
        assert!(!session.toggle_normalize());
        let report = advanced(session.tick());
        assert_eq!(report.value, report.raw);
    }

    #[test]
    fn normalized_value_spans_unit_range() {
        let mut v = vec![2.0; CYCLE_LEN];
        v[0] = 4.0;
        let ds = Dataset::new(vec![PatientRecord::new(v, Label::Normal)]).unwrap();
        let mut session = Session::new(ds, fast_config(), ManualClock::new(0));
        let report = advanced(session.tick());
        assert_eq!(report.raw, 4.0);
        assert_eq!(report.value, 1.0);
        // the buffer always holds raw samples
        assert_eq!(session.buffer().values(), vec![4.0]);
    }

    #[derive(Default)]
    struct Recorder {
        commands: usize,
        particles: usize,
        presented: usize,
    }

    impl RenderSurface for Recorder {
        fn apply(&mut self, _command: &PartCommand) {
            self.commands += 1;
        }
        fn update_particles(&mut self, particles: &[Particle]) {
            self.particles = particles.len();
        }
        fn present(&mut self) {
            self.presented += 1;
        }
    }

    #[test]
    fn present_replays_last_pose() {
        let mut session = Session::new(synthetic_dataset(1), PlaybackConfig::default(), ManualClock::new(0));
        let mut surface = Recorder::default();
        let pose_len = advanced(session.tick()).pose.commands.len();
        assert!(matches!(session.tick(), FrameOutcome::Skipped));
        session.present(&mut surface);
        assert_eq!(surface.commands, pose_len);
        assert_eq!(surface.particles, 95);
        assert_eq!(surface.presented, 1);
    }

    #[test]
    fn trace_follows_last_processed_index() {
        let mut session = Session::new(synthetic_dataset(1), fast_config(), ManualClock::new(0));
        for _ in 0..3 {
            session.tick();
        }
        let trace = session.trace(700.0, 200.0);
        assert_eq!(trace.points[0].index.get(), 2);
    }

    #[test]
    fn trace_restarts_with_new_patient() {
        let mut session = Session::new(synthetic_dataset(1), fast_config(), ManualClock::new(0));
        for _ in 0..20 {
            session.tick();
        }
        session.select_patient(3).unwrap();
        assert!(session.last_frame().is_none());
        let trace = session.trace(700.0, 200.0);
        assert_eq!(trace.points[0].index.get(), 0);
        let fresh = build_trace(
            &session.patient().waveform,
            CycleIndex::new(0),
            &Segments::undetected(),
            true,
            700.0,
            200.0,
        );
        assert_eq!(trace.points[0].y, fresh.points[0].y);
    }

    #[test]
    fn undersized_buffer_still_detects() {
        let cfg = PlaybackConfig {
            buffer_capacity: 10,
            ..fast_config()
        };
        let mut session = Session::new(synthetic_dataset(4), cfg, ManualClock::new(0));
        for _ in 0..CYCLE_LEN {
            session.tick();
        }
        assert_eq!(session.buffer().len(), 30);
        assert!(!session.segments().is_undetected());
    }
}
