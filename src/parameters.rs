use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::Extent;
use crate::domain::MIN_SLAB_WIDTHS;

/// Everything the simulation reads from its parameter file. All fields
/// have defaults, so an absent file means an all-default run. The tunable
/// subset seeds the coordinator's control panel; the rest is fixed for
/// the lifetime of the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    pub max_x: f32,
    pub max_y: f32,
    /// Lattice constant of the initial grid fill.
    pub spacing: f32,
    /// Fraction of the box height filled with fluid at init.
    pub fill_fraction: f32,
    /// Particle store head-room as a multiple of the initial count.
    pub capacity_factor: f32,
    pub particle_mass: f32,
    pub gravity: f32,
    pub smoothing_radius: f32,
    pub rest_density: f32,
    pub k_corr: f32,
    /// Anti-clustering radius as a fraction of the smoothing radius.
    pub dq_factor: f32,
    pub viscosity: f32,
    pub dt: f32,
    pub steps_per_frame: i32,
    pub mover_radius: f32,
    /// Stop after this many displayed frames; `None` runs until a kill
    /// event arrives.
    pub max_frames: Option<u64>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            max_x: 20.0,
            max_y: 10.0,
            spacing: 0.1,
            fill_fraction: 0.5,
            capacity_factor: 2.0,
            particle_mass: 0.01,
            gravity: 9.0,
            smoothing_radius: 0.2,
            rest_density: 1.0,
            k_corr: 0.1,
            dq_factor: 0.3,
            viscosity: 0.05,
            dt: 1.0 / 60.0,
            steps_per_frame: 3,
            mover_radius: 2.0,
            max_frames: None,
        }
    }
}

impl SimulationParameters {
    pub fn from_file(path: &Path) -> Result<Self, SetupError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| SetupError::ParameterFile(format!("{}: {}", path.display(), err)))?;
        serde_yaml::from_str(&contents)
            .map_err(|err| SetupError::ParameterFile(format!("{}: {}", path.display(), err)))
    }

    pub fn extent(&self) -> Extent {
        Extent::new(0.0, self.max_x, 0.0, self.max_y)
    }

    /// Reject configurations the solver cannot run on. `world_size`
    /// includes the coordinator rank.
    pub fn validate(&self, world_size: usize) -> Result<(), SetupError> {
        if world_size < 2 {
            return Err(SetupError::WorldTooSmall(world_size));
        }
        if !(self.max_x > 0.0) || !(self.max_y > 0.0) {
            return Err(SetupError::InvalidDomain {
                max_x: self.max_x,
                max_y: self.max_y,
            });
        }
        if !(self.spacing > 0.0) {
            return Err(SetupError::InvalidSpacing(self.spacing));
        }
        if !(self.dt > 0.0) {
            return Err(SetupError::InvalidTimeStep(self.dt));
        }
        if self.steps_per_frame < 1 {
            return Err(SetupError::InvalidSteps(self.steps_per_frame));
        }
        let num_workers = world_size - 1;
        let slab_width = self.max_x / num_workers as f32;
        if slab_width < MIN_SLAB_WIDTHS * self.smoothing_radius {
            return Err(SetupError::SlabTooNarrow {
                width: slab_width,
                smoothing_radius: self.smoothing_radius,
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum SetupError {
    WorldTooSmall(usize),
    InvalidDomain { max_x: f32, max_y: f32 },
    InvalidSpacing(f32),
    InvalidTimeStep(f32),
    InvalidSteps(i32),
    SlabTooNarrow { width: f32, smoothing_radius: f32 },
    ParameterFile(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorldTooSmall(size) => write!(
                f,
                "need at least one coordinator and one worker rank, got a world of {}",
                size
            ),
            Self::InvalidDomain { max_x, max_y } => {
                write!(f, "domain extents must be positive, got {} x {}", max_x, max_y)
            }
            Self::InvalidSpacing(spacing) => {
                write!(f, "particle spacing must be positive, got {}", spacing)
            }
            Self::InvalidTimeStep(dt) => write!(f, "time step must be positive, got {}", dt),
            Self::InvalidSteps(steps) => {
                write!(f, "steps_per_frame must be at least 1, got {}", steps)
            }
            Self::SlabTooNarrow {
                width,
                smoothing_radius,
            } => write!(
                f,
                "slab width {} cannot carry a halo band at smoothing radius {}; \
                 use fewer workers or a smaller radius",
                width, smoothing_radius
            ),
            Self::ParameterFile(message) => write!(f, "failed to read parameters: {}", message),
        }
    }
}

impl Error for SetupError {}
