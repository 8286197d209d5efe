use crate::detectors::phase::CardiacPhase;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Group of flow paths that the cardiac phase switches together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowChannel {
    RaInflow,
    RaToRv,
    RvToPa,
    LaInflow,
    LaToLv,
    LvToAo,
    Other,
}

impl FlowChannel {
    pub fn from_path_name(name: &str) -> Self {
        match name {
            n if n.contains("svc-to-ra") || n.contains("ivc-to-ra") => FlowChannel::RaInflow,
            "ra-to-rv" => FlowChannel::RaToRv,
            "rv-to-pa" => FlowChannel::RvToPa,
            n if n.contains("pv-to-la") => FlowChannel::LaInflow,
            "la-to-lv" => FlowChannel::LaToLv,
            "lv-to-ao" | "ao-arch" => FlowChannel::LvToAo,
            _ => FlowChannel::Other,
        }
    }

    fn is_outflow(self) -> bool {
        matches!(self, FlowChannel::RvToPa | FlowChannel::LvToAo)
    }

    fn is_av_flow(self) -> bool {
        matches!(self, FlowChannel::RaToRv | FlowChannel::LaToLv)
    }

    fn is_inflow(self) -> bool {
        matches!(self, FlowChannel::RaInflow | FlowChannel::LaInflow)
    }
}

/// Straight segment along which a batch of particles travels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPath {
    pub name: String,
    pub start: [f64; 3],
    pub end: [f64; 3],
    pub color: u32,
    pub count: usize,
}

impl FlowPath {
    fn new(name: &str, start: [f64; 3], end: [f64; 3], color: u32, count: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            color,
            count,
        }
    }
}

const DEOXYGENATED: u32 = 0x4682B4;
const OXYGENATED: u32 = 0xC71515;

/// The eight blood-flow paths of the heart model.
pub fn default_flow_paths() -> Vec<FlowPath> {
    vec![
        FlowPath::new("svc-to-ra", [1.0, 1.2, 0.3], [1.0, 0.8, 0.3], DEOXYGENATED, 10),
        FlowPath::new("ivc-to-ra", [1.1, -0.9, 0.3], [1.0, -0.3, 0.3], DEOXYGENATED, 10),
        FlowPath::new("ra-to-rv", [1.0, 0.3, 0.3], [1.0, -0.6, 0.2], DEOXYGENATED, 15),
        FlowPath::new("rv-to-pa", [1.0, -0.6, 0.2], [2.0, -0.6, 0.2], DEOXYGENATED, 15),
        FlowPath::new("pv-to-la", [-1.2, 1.0, 0.3], [-1.0, 0.8, 0.3], OXYGENATED, 10),
        FlowPath::new("la-to-lv", [-1.0, 0.3, 0.3], [-1.0, -0.7, 0.2], OXYGENATED, 15),
        FlowPath::new("lv-to-ao", [-1.0, -0.7, 0.2], [-0.4, -0.3, 0.2], OXYGENATED, 10),
        FlowPath::new("ao-arch", [-0.3, 0.4, 0.2], [-0.8, 0.8, 0.2], OXYGENATED, 10),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub channel: FlowChannel,
    pub start: [f64; 3],
    pub end: [f64; 3],
    pub position: [f64; 3],
    pub progress: f64,
    pub speed: f64,
    pub active: bool,
    pub color: u32,
}

fn lerp(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn jitter(rng: &mut StdRng, p: &mut [f64; 3], amount: f64) {
    for axis in p.iter_mut() {
        *axis += (rng.gen::<f64>() - 0.5) * amount;
    }
}

/// Blood particles advanced once per frame according to the cardiac phase.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticleSystem {
    pub fn new(paths: &[FlowPath], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut particles = Vec::with_capacity(paths.iter().map(|p| p.count).sum());
        for path in paths {
            let channel = FlowChannel::from_path_name(&path.name);
            for _ in 0..path.count {
                let progress = rng.gen::<f64>();
                let mut position = lerp(path.start, path.end, progress);
                jitter(&mut rng, &mut position, 0.05);
                particles.push(Particle {
                    channel,
                    start: path.start,
                    end: path.end,
                    position,
                    progress,
                    speed: 0.005 + rng.gen::<f64>() * 0.01,
                    active: true,
                    color: path.color,
                });
            }
        }
        Self { particles, rng }
    }

    pub fn with_default_paths(seed: u64) -> Self {
        Self::new(&default_flow_paths(), seed)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    /// Apply the phase's flow rules, then move every active particle.
    pub fn advance(&mut self, phase: CardiacPhase) {
        let rng = &mut self.rng;
        for particle in &mut self.particles {
            let ch = particle.channel;
            let mut active = true;
            match phase {
                CardiacPhase::AtrialSystole => {
                    if ch.is_outflow() {
                        active = false;
                    } else if ch.is_av_flow() {
                        particle.speed = 0.02 + rng.gen::<f64>() * 0.01;
                    }
                }
                CardiacPhase::VentricularSystole => {
                    if ch.is_av_flow() {
                        active = false;
                    } else if ch.is_outflow() {
                        particle.speed = 0.02 + rng.gen::<f64>() * 0.01;
                    }
                }
                CardiacPhase::VentricularRepolarization => {
                    particle.speed = if ch.is_inflow() {
                        0.01 + rng.gen::<f64>() * 0.01
                    } else {
                        0.005 + rng.gen::<f64>() * 0.005
                    };
                }
                CardiacPhase::Diastole => {
                    particle.speed = if ch.is_outflow() {
                        0.003 + rng.gen::<f64>() * 0.003
                    } else {
                        0.008 + rng.gen::<f64>() * 0.005
                    };
                }
            }

            particle.active = active;
            if !active {
                continue;
            }
            particle.progress += particle.speed;
            if particle.progress > 1.0 {
                particle.progress = 0.0;
                particle.position = particle.start;
                jitter(rng, &mut particle.position, 0.05);
            } else {
                particle.position = lerp(particle.start, particle.end, particle.progress);
                if rng.gen::<f64>() > 0.9 {
                    jitter(rng, &mut particle.position, 0.01);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_path_names_to_channels() {
        assert_eq!(FlowChannel::from_path_name("svc-to-ra"), FlowChannel::RaInflow);
        assert_eq!(FlowChannel::from_path_name("ao-arch"), FlowChannel::LvToAo);
        assert_eq!(FlowChannel::from_path_name("pv-to-la"), FlowChannel::LaInflow);
        assert_eq!(FlowChannel::from_path_name("coronary"), FlowChannel::Other);
    }

    #[test]
    fn default_paths_spawn_ninety_five_particles() {
        let system = ParticleSystem::with_default_paths(7);
        assert_eq!(system.particles().len(), 95);
        assert_eq!(system.active_count(), 95);
    }

    #[test]
    fn atrial_systole_stops_outflow() {
        let mut system = ParticleSystem::with_default_paths(1);
        system.advance(CardiacPhase::AtrialSystole);
        // rv-to-pa (15) + lv-to-ao (10) + ao-arch (10)
        assert_eq!(system.active_count(), 95 - 35);
        assert!(system
            .particles()
            .iter()
            .filter(|p| p.channel.is_av_flow())
            .all(|p| p.speed >= 0.02 && p.speed <= 0.03));
    }

    #[test]
    fn ventricular_systole_stops_av_flow() {
        let mut system = ParticleSystem::with_default_paths(1);
        system.advance(CardiacPhase::VentricularSystole);
        assert_eq!(system.active_count(), 95 - 30);
    }

    #[test]
    fn progress_wraps_back_to_path_start() {
        let path = FlowPath::new("ra-to-rv", [0.0; 3], [1.0, 0.0, 0.0], DEOXYGENATED, 1);
        let mut system = ParticleSystem::new(&[path], 3);
        for _ in 0..500 {
            system.advance(CardiacPhase::Diastole);
            let p = &system.particles()[0];
            assert!((0.0..=1.0).contains(&p.progress));
        }
    }

    #[test]
    fn same_seed_same_motion() {
        let mut a = ParticleSystem::with_default_paths(11);
        let mut b = ParticleSystem::with_default_paths(11);
        for phase in [CardiacPhase::Diastole, CardiacPhase::VentricularSystole] {
            a.advance(phase);
            b.advance(phase);
        }
        let pa: Vec<_> = a.particles().iter().map(|p| p.position).collect();
        let pb: Vec<_> = b.particles().iter().map(|p| p.position).collect();
        assert_eq!(pa, pb);
    }
}
