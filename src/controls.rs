//! Coordinator-side parameter model: a cyclic selector over the tunable
//! fields, stepped mutation with per-field bounds, and the mover controls.

use glam::Vec2;

use crate::display::Projection;
use crate::parameters::SimulationParameters;

pub const MOVER_RADIUS_MIN: f32 = 1.0;
pub const MOVER_RADIUS_MAX: f32 = 4.0;
pub const MOVER_RADIUS_STEP: f32 = 0.2;
pub const MOVER_RADIUS_DEFAULT: f32 = 2.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TunableField {
    Gravity,
    Smoothing,
    Density,
    Clustering,
    ClusteringRadius,
    Viscosity,
}

impl TunableField {
    pub fn next(self) -> Self {
        match self {
            Self::Gravity => Self::Smoothing,
            Self::Smoothing => Self::Density,
            Self::Density => Self::Clustering,
            Self::Clustering => Self::ClusteringRadius,
            Self::ClusteringRadius => Self::Viscosity,
            Self::Viscosity => Self::Gravity,
        }
    }
}

struct FieldRange {
    min: f32,
    max: f32,
    step: f32,
}

/// Bounds and step size per field. The anti-clustering radius is bounded
/// by and stepped relative to the current smoothing radius.
fn range_of(field: TunableField, smoothing_radius: f32) -> FieldRange {
    let (min, max, step) = match field {
        TunableField::Gravity => (-9.0, 9.0, 1.0),
        TunableField::Smoothing => (0.0, 5.0, 0.1),
        TunableField::Density => (-5.0, 5.0, 0.01),
        TunableField::Clustering => (-5.0, 5.0, 0.05),
        TunableField::ClusteringRadius => (0.0, smoothing_radius, 0.05 * smoothing_radius),
        TunableField::Viscosity => (-100.0, 100.0, 0.05),
    };
    FieldRange { min, max, step }
}

/// Events emitted by the user-input collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlEvent {
    SelectNext,
    Increase,
    Decrease,
    MoverGrow,
    MoverShrink,
    MoverReset,
    MoverCenter { x: f32, y: f32, z: f32 },
    AddPartition,
    RemovePartition,
    Kill,
}

pub trait ControlSource {
    fn poll(&mut self, frame: u64) -> Vec<ControlEvent>;
}

/// A source that never emits anything; the headless default.
#[derive(Default)]
pub struct IdleControls;

impl ControlSource for IdleControls {
    fn poll(&mut self, _frame: u64) -> Vec<ControlEvent> {
        Vec::new()
    }
}

/// Replays a fixed list of (frame, event) pairs; used by demos and the
/// pipeline tests.
pub struct ScriptedControls {
    script: Vec<(u64, ControlEvent)>,
}

impl ScriptedControls {
    pub fn new(script: Vec<(u64, ControlEvent)>) -> Self {
        Self { script }
    }
}

impl ControlSource for ScriptedControls {
    fn poll(&mut self, frame: u64) -> Vec<ControlEvent> {
        let (now, later) = self
            .script
            .drain(..)
            .partition(|(at, _)| *at <= frame);
        self.script = later;
        now.into_iter().map(|(_, event)| event).collect()
    }
}

/// The authoritative copies of all user-tunable values.
#[derive(Clone, Debug)]
pub struct ControlPanel {
    selected: TunableField,
    pub gravity: f32,
    pub smoothing_radius: f32,
    pub rest_density: f32,
    pub k_corr: f32,
    pub dq_corr: f32,
    pub viscosity: f32,
    pub mover_center: Vec2,
    pub mover_radius: f32,
}

impl ControlPanel {
    pub fn new(params: &SimulationParameters) -> Self {
        Self {
            selected: TunableField::Gravity,
            gravity: params.gravity,
            smoothing_radius: params.smoothing_radius,
            rest_density: params.rest_density,
            k_corr: params.k_corr,
            dq_corr: params.dq_factor * params.smoothing_radius,
            viscosity: params.viscosity,
            mover_center: params.extent().center(),
            mover_radius: params.mover_radius,
        }
    }

    pub fn selected(&self) -> TunableField {
        self.selected
    }

    pub fn select_next(&mut self) {
        self.selected = self.selected.next();
    }

    pub fn increase(&mut self) {
        self.step(1.0);
    }

    pub fn decrease(&mut self) {
        self.step(-1.0);
    }

    fn step(&mut self, direction: f32) {
        let range = range_of(self.selected, self.smoothing_radius);
        // The gravity knob is inverted: stepping it up lowers g.
        let direction = if self.selected == TunableField::Gravity {
            -direction
        } else {
            direction
        };
        let value = self.field_mut(self.selected);
        *value = (*value + direction * range.step).clamp(range.min, range.max);
        if self.selected == TunableField::Smoothing {
            // The anti-clustering radius must stay inside the kernel
            // support.
            self.dq_corr = self.dq_corr.min(self.smoothing_radius);
        }
    }

    fn field_mut(&mut self, field: TunableField) -> &mut f32 {
        match field {
            TunableField::Gravity => &mut self.gravity,
            TunableField::Smoothing => &mut self.smoothing_radius,
            TunableField::Density => &mut self.rest_density,
            TunableField::Clustering => &mut self.k_corr,
            TunableField::ClusteringRadius => &mut self.dq_corr,
            TunableField::Viscosity => &mut self.viscosity,
        }
    }

    pub fn mover_grow(&mut self) {
        self.mover_radius = (self.mover_radius + MOVER_RADIUS_STEP).min(MOVER_RADIUS_MAX);
    }

    pub fn mover_shrink(&mut self) {
        self.mover_radius = (self.mover_radius - MOVER_RADIUS_STEP).max(MOVER_RADIUS_MIN);
    }

    pub fn mover_reset(&mut self) {
        self.mover_radius = MOVER_RADIUS_DEFAULT;
    }

    pub fn set_center_from_display(&mut self, x: f32, y: f32, z: f32, projection: &Projection) {
        self.mover_center = projection.to_simulation(x, y, z);
    }
}
