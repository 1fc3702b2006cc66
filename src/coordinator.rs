//! Rank 0: owns the authoritative tunables and the partition layout,
//! scatters per-worker parameter snapshots and gathers the packed
//! coordinate frames for the display.

use std::collections::VecDeque;

use glam::Vec2;
use log::info;
use log::warn;

use crate::communication::comms::Comms;
use crate::communication::Rank;
use crate::communication::WorldCommunicator;
use crate::controls::ControlEvent;
use crate::controls::ControlPanel;
use crate::controls::ControlSource;
use crate::display::Display;
use crate::display::FrameData;
use crate::display::Projection;
use crate::domain::Extent;
use crate::domain::PartitionLayout;
use crate::messages::unpack_coord;
use crate::messages::Tunables;
use crate::parameters::SetupError;
use crate::parameters::SimulationParameters;

enum PartitionOp {
    Add,
    Remove,
}

pub struct Coordinator {
    comms: Comms,
    params: SimulationParameters,
    extent: Extent,
    panel: ControlPanel,
    layout: PartitionLayout,
    projection: Projection,
    /// Layout changes wait here; workers can follow at most one change
    /// per scatter.
    pending_ops: VecDeque<PartitionOp>,
    frame: u64,
}

impl Coordinator {
    pub fn new(comms: Comms, params: SimulationParameters) -> Result<Self, SetupError> {
        params.validate(comms.size)?;
        let extent = params.extent();
        let layout = PartitionLayout::new(comms.size - 1, params.max_x);
        let panel = ControlPanel::new(&params);
        let projection = Projection::for_extent(&extent);
        Ok(Self {
            comms,
            params,
            extent,
            panel,
            layout,
            projection,
            pending_ops: VecDeque::new(),
            frame: 0,
        })
    }

    /// Drive frames until a kill event or the configured frame budget.
    /// Every iteration scatters the tunables the workers will pick up at
    /// the end of their current frame, then collects that frame's
    /// coordinates, overlapping their simulation with our display work.
    pub fn run(&mut self, display: &mut dyn Display, controls: &mut dyn ControlSource) {
        self.scatter(false);
        loop {
            let mut kill = self.apply_controls(controls);
            if let Some(max_frames) = self.params.max_frames {
                if self.frame + 1 >= max_frames {
                    kill = true;
                }
            }
            self.scatter(kill);
            let frame = self.gather();
            display.frame(&frame, &self.projection);
            self.frame += 1;
            if kill {
                break;
            }
        }
        info!("coordinator exited after {} frames", self.frame);
    }

    fn apply_controls(&mut self, controls: &mut dyn ControlSource) -> bool {
        let mut kill = false;
        for event in controls.poll(self.frame) {
            match event {
                ControlEvent::SelectNext => self.panel.select_next(),
                ControlEvent::Increase => self.panel.increase(),
                ControlEvent::Decrease => self.panel.decrease(),
                ControlEvent::MoverGrow => self.panel.mover_grow(),
                ControlEvent::MoverShrink => self.panel.mover_shrink(),
                ControlEvent::MoverReset => self.panel.mover_reset(),
                ControlEvent::MoverCenter { x, y, z } => {
                    self.panel.set_center_from_display(x, y, z, &self.projection)
                }
                ControlEvent::AddPartition => self.pending_ops.push_back(PartitionOp::Add),
                ControlEvent::RemovePartition => self.pending_ops.push_back(PartitionOp::Remove),
                ControlEvent::Kill => kill = true,
            }
        }
        if let Some(op) = self.pending_ops.pop_front() {
            let applied = match op {
                PartitionOp::Add => self.layout.add_partition(self.panel.smoothing_radius),
                PartitionOp::Remove => self.layout.remove_partition(),
            };
            if applied {
                info!(
                    "partition layout changed, {} of {} workers active",
                    self.layout.num_active(),
                    self.layout.num_workers()
                );
            } else {
                warn!("partition change rejected by the layout constraints");
            }
        }
        kill
    }

    fn scatter(&mut self, kill: bool) {
        for worker in 0..self.layout.num_workers() {
            let tunables = self.tunables_for(worker, kill);
            self.comms
                .tunables
                .send_vec(worker as Rank + 1, vec![tunables]);
        }
    }

    fn tunables_for(&self, worker: usize, kill: bool) -> Tunables {
        Tunables {
            gravity: self.panel.gravity,
            smoothing_radius: self.panel.smoothing_radius,
            k_corr: self.panel.k_corr,
            dq_corr: self.panel.dq_corr,
            rest_density: self.panel.rest_density,
            viscosity: self.panel.viscosity,
            dt: self.params.dt,
            mover_x: self.panel.mover_center.x,
            mover_y: self.panel.mover_center.y,
            mover_radius: self.panel.mover_radius,
            node_start_x: self.layout.start(worker),
            node_end_x: self.layout.end(worker),
            steps_per_frame: self.params.steps_per_frame,
            num_active: self.layout.num_active() as i32,
            active: self.layout.is_active(worker) as u8,
            kill_sim: kill as u8,
        }
    }

    /// Collect one packed coordinate frame from every worker and decode
    /// it back into simulation space.
    fn gather(&mut self) -> FrameData {
        let num_workers = self.layout.num_workers();
        let mut positions = Vec::new();
        let mut counts = Vec::with_capacity(num_workers);
        for worker in 0..num_workers {
            let packed = self.comms.coords.receive_vec(worker as Rank + 1);
            counts.push(packed.len() / 2);
            for pair in packed.chunks_exact(2) {
                positions.push(Vec2::new(
                    unpack_coord(pair[0], self.extent.max.x),
                    unpack_coord(pair[1], self.extent.max.y),
                ));
            }
        }
        FrameData {
            frame: self.frame,
            positions,
            counts,
        }
    }
}
