//! Animation driver contract: turns a cardiac phase and a display sample into
//! per-part transform commands for an external 3D rendering surface.

pub mod particles;

use crate::detectors::phase::CardiacPhase;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub use particles::{FlowChannel, FlowPath, Particle, ParticleSystem};

/// Anatomical parts addressable on the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeartPart {
    RightAtrium,
    LeftAtrium,
    RightVentricle,
    LeftVentricle,
    BloodRightAtrium,
    BloodLeftAtrium,
    BloodRightVentricle,
    BloodLeftVentricle,
    TricuspidValve,
    MitralValve,
    PulmonaryValve,
    AorticValve,
    PulmonaryArtery,
    Aorta,
    AortaArch,
    SuperiorVenaCava,
    InferiorVenaCava,
}

/// One transform for one part. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartCommand {
    pub part: HeartPart,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    /// Rotation about z in radians; for valves this applies to every leaflet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<[f64; 3]>,
}

impl PartCommand {
    fn new(part: HeartPart) -> Self {
        Self {
            part,
            scale: None,
            rotation_z: None,
            color: None,
        }
    }

    fn scale(part: HeartPart, scale: [f64; 3]) -> Self {
        Self {
            scale: Some(scale),
            ..Self::new(part)
        }
    }

    fn uniform(part: HeartPart, s: f64) -> Self {
        Self::scale(part, [s, s, s])
    }

    fn rotate(part: HeartPart, angle: f64) -> Self {
        Self {
            rotation_z: Some(angle),
            ..Self::new(part)
        }
    }

    fn color(part: HeartPart, rgb: [f64; 3]) -> Self {
        Self {
            color: Some(rgb),
            ..Self::new(part)
        }
    }
}

/// Everything the rendering surface must apply for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartPose {
    pub intensity: f64,
    pub commands: Vec<PartCommand>,
}

impl HeartPose {
    pub fn command(&self, part: HeartPart) -> Option<&PartCommand> {
        self.commands.iter().rev().find(|c| c.part == part)
    }
}

/// Consumer of poses and particles, implemented by whatever draws the heart.
pub trait RenderSurface {
    fn apply(&mut self, command: &PartCommand);
    fn update_particles(&mut self, particles: &[Particle]);
    fn present(&mut self);

    fn apply_pose(&mut self, pose: &HeartPose) {
        for command in &pose.commands {
            self.apply(command);
        }
    }
}

const BASE_TILT: f64 = -PI / 12.0;

/// Contraction strength for a display value in `[0, 1]`.
pub fn intensity(value: f64) -> f64 {
    (value * 2.0).min(1.0)
}

/// Compute the pose for `phase`. `time_ms` drives the resting pulse in diastole.
pub fn heart_pose(phase: CardiacPhase, value: f64, time_ms: u64) -> HeartPose {
    use HeartPart::*;

    let k = intensity(value);
    let mut cmds = Vec::with_capacity(24);
    let valves = |cmds: &mut Vec<PartCommand>, av: f64, semilunar: f64| {
        cmds.push(PartCommand::rotate(TricuspidValve, av));
        cmds.push(PartCommand::rotate(MitralValve, av));
        cmds.push(PartCommand::rotate(PulmonaryValve, semilunar));
        cmds.push(PartCommand::rotate(AorticValve, semilunar));
    };

    match phase {
        CardiacPhase::AtrialSystole => {
            let c = 1.0 - k * 0.4;
            for (part, tilt) in [(RightAtrium, k * 0.1), (LeftAtrium, -k * 0.1)] {
                cmds.push(PartCommand {
                    rotation_z: Some(BASE_TILT + tilt),
                    ..PartCommand::scale(part, [c * 0.9, c, c * 1.1])
                });
            }
            cmds.push(PartCommand::uniform(BloodRightAtrium, c * 0.6));
            cmds.push(PartCommand::uniform(BloodLeftAtrium, c * 0.6));
            let fill = 1.0 + k * 0.25;
            cmds.push(PartCommand::scale(BloodRightVentricle, [fill * 1.1, fill, fill * 0.9]));
            cmds.push(PartCommand::scale(BloodLeftVentricle, [fill * 1.1, fill, fill * 0.9]));
            valves(&mut cmds, PI * 0.5 * k, 0.0);
            cmds.push(PartCommand::color(RightAtrium, [0.6 + k * 0.3, 0.5 + k * 0.1, 0.8]));
            cmds.push(PartCommand::color(LeftAtrium, [0.9, 0.4 + k * 0.2, 0.4 + k * 0.2]));
        }
        CardiacPhase::VentricularSystole => {
            let c = 1.0 - k * 0.5;
            for (part, tilt) in [(RightVentricle, k * 0.15), (LeftVentricle, -k * 0.15)] {
                cmds.push(PartCommand {
                    rotation_z: Some(BASE_TILT + tilt),
                    ..PartCommand::scale(part, [c * 1.1, c * 0.9, c])
                });
            }
            cmds.push(PartCommand::uniform(BloodRightVentricle, c * 0.5));
            cmds.push(PartCommand::uniform(BloodLeftVentricle, c * 0.5));
            let fill = 1.0 + k * 0.15;
            cmds.push(PartCommand::scale(RightAtrium, [fill * 1.05, fill, fill * 0.95]));
            cmds.push(PartCommand::scale(LeftAtrium, [fill * 1.05, fill, fill * 0.95]));
            cmds.push(PartCommand::uniform(BloodRightAtrium, fill * 0.8));
            cmds.push(PartCommand::uniform(BloodLeftAtrium, fill * 0.8));
            valves(&mut cmds, 0.0, PI * 0.4 * k);
            cmds.push(PartCommand::color(RightVentricle, [0.5 + k * 0.3, 0.4 + k * 0.1, 0.7]));
            cmds.push(PartCommand::color(LeftVentricle, [0.8, 0.3 + k * 0.2, 0.3 + k * 0.2]));
            let pulse = 1.0 + k * 0.25;
            cmds.push(PartCommand::scale(PulmonaryArtery, [1.0, pulse, 1.0]));
            cmds.push(PartCommand::scale(Aorta, [pulse, 1.0, 1.0]));
            cmds.push(PartCommand::uniform(AortaArch, pulse));
        }
        CardiacPhase::VentricularRepolarization => {
            let relax = 1.0 + k * 0.2;
            for part in [RightVentricle, LeftVentricle] {
                cmds.push(PartCommand {
                    rotation_z: Some(BASE_TILT),
                    ..PartCommand::scale(part, [relax * 1.05, relax * 0.95, relax])
                });
            }
            let passive = 1.0 + k * 0.15;
            cmds.push(PartCommand::uniform(BloodRightVentricle, passive));
            cmds.push(PartCommand::uniform(BloodLeftVentricle, passive));
            let atria = 1.0 + k * 0.2;
            cmds.push(PartCommand::scale(RightAtrium, [atria * 1.05, atria, atria * 0.95]));
            cmds.push(PartCommand::scale(LeftAtrium, [atria * 1.05, atria, atria * 0.95]));
            cmds.push(PartCommand::uniform(BloodRightAtrium, atria * 0.85));
            cmds.push(PartCommand::uniform(BloodLeftAtrium, atria * 0.85));
            valves(&mut cmds, PI * 0.3 * k, 0.0);
            cmds.push(PartCommand::color(RightVentricle, [0.5, 0.4, 0.6]));
            cmds.push(PartCommand::color(LeftVentricle, [0.7, 0.3, 0.3]));
            for part in [PulmonaryArtery, Aorta, AortaArch] {
                cmds.push(PartCommand::uniform(part, 1.0));
            }
        }
        CardiacPhase::Diastole => {
            let pulse = (time_ms as f64 * 0.002).sin() * 0.04;
            let fill = 1.1 + pulse;
            for part in [RightAtrium, LeftAtrium] {
                cmds.push(PartCommand {
                    rotation_z: Some(BASE_TILT),
                    ..PartCommand::scale(part, [fill * 1.05, fill, fill * 0.95])
                });
            }
            cmds.push(PartCommand::scale(RightVentricle, [fill * 1.05, fill * 0.95, fill]));
            cmds.push(PartCommand::scale(LeftVentricle, [fill * 1.05, fill * 0.95, fill]));
            let blood = fill * 0.9;
            cmds.push(PartCommand::uniform(BloodRightAtrium, blood));
            cmds.push(PartCommand::uniform(BloodLeftAtrium, blood));
            cmds.push(PartCommand::uniform(BloodRightVentricle, blood * 0.95));
            cmds.push(PartCommand::uniform(BloodLeftVentricle, blood * 0.95));
            valves(&mut cmds, PI * 0.2 + pulse * 0.15, 0.0);
            cmds.push(PartCommand::color(RightAtrium, [0.5, 0.4, 0.6 + pulse * 0.1]));
            cmds.push(PartCommand::color(LeftAtrium, [0.7 + pulse * 0.1, 0.3, 0.3]));
            cmds.push(PartCommand::color(RightVentricle, [0.5, 0.4, 0.6]));
            cmds.push(PartCommand::color(LeftVentricle, [0.7, 0.3, 0.3]));
            let venous = 1.0 + pulse * 0.6;
            cmds.push(PartCommand::scale(SuperiorVenaCava, [1.0, venous, 1.0]));
            cmds.push(PartCommand::scale(InferiorVenaCava, [venous, 1.0, 1.0]));
        }
    }

    HeartPose {
        intensity: k,
        commands: cmds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_saturates_at_one() {
        assert_eq!(intensity(0.25), 0.5);
        assert_eq!(intensity(0.9), 1.0);
    }

    #[test]
    fn atrial_systole_squeezes_atria_and_opens_av_valves() {
        let pose = heart_pose(CardiacPhase::AtrialSystole, 0.5, 0);
        let ra = pose.command(HeartPart::RightAtrium).expect("ra");
        assert!(ra.color.is_some());
        let scale = pose
            .commands
            .iter()
            .find(|c| c.part == HeartPart::RightAtrium && c.scale.is_some())
            .and_then(|c| c.scale)
            .expect("scale");
        assert!((scale[1] - 0.6).abs() < 1e-12);
        let mitral = pose.command(HeartPart::MitralValve).expect("mitral");
        assert!((mitral.rotation_z.unwrap_or_default() - PI * 0.5).abs() < 1e-12);
        assert_eq!(pose.command(HeartPart::AorticValve).and_then(|c| c.rotation_z), Some(0.0));
    }

    #[test]
    fn ventricular_systole_pulses_great_vessels() {
        let pose = heart_pose(CardiacPhase::VentricularSystole, 1.0, 0);
        let arch = pose.command(HeartPart::AortaArch).expect("arch");
        assert_eq!(arch.scale, Some([1.25, 1.25, 1.25]));
        assert_eq!(pose.command(HeartPart::TricuspidValve).and_then(|c| c.rotation_z), Some(0.0));
    }

    #[test]
    fn diastole_at_time_zero_rests_at_base_fill() {
        let pose = heart_pose(CardiacPhase::Diastole, 0.0, 0);
        let svc = pose.command(HeartPart::SuperiorVenaCava).expect("svc");
        assert_eq!(svc.scale, Some([1.0, 1.0, 1.0]));
        let valve = pose.command(HeartPart::MitralValve).and_then(|c| c.rotation_z);
        assert_eq!(valve, Some(PI * 0.2));
    }

    #[derive(Default)]
    struct Recorder {
        applied: usize,
        presented: bool,
    }

    impl RenderSurface for Recorder {
        fn apply(&mut self, _command: &PartCommand) {
            self.applied += 1;
        }
        fn update_particles(&mut self, _particles: &[Particle]) {}
        fn present(&mut self) {
            self.presented = true;
        }
    }

    #[test]
    fn surface_receives_every_command() {
        let pose = heart_pose(CardiacPhase::VentricularRepolarization, 0.3, 0);
        let mut surface = Recorder::default();
        surface.apply_pose(&pose);
        surface.present();
        assert_eq!(surface.applied, pose.commands.len());
        assert!(surface.presented);
    }
}
