//! Whole-pipeline scenarios: coordinator plus workers as threads over the
//! in-process transport.

use std::thread;

use glam::Vec2;

use crate::communication::comms::Comms;
use crate::controls::ControlEvent;
use crate::controls::ScriptedControls;
use crate::coordinator::Coordinator;
use crate::display::Display;
use crate::display::FrameData;
use crate::display::Projection;
use crate::fluid::Particle;
use crate::fluid::Worker;
use crate::parameters::SimulationParameters;

/// Keeps every gathered frame for the assertions.
#[derive(Default)]
struct RecordingDisplay {
    frames: Vec<(Vec<Vec2>, Vec<usize>)>,
}

impl Display for RecordingDisplay {
    fn frame(&mut self, frame: &FrameData, _projection: &Projection) {
        self.frames
            .push((frame.positions.clone(), frame.counts.clone()));
    }
}

/// Spawn one thread per worker, run the coordinator on the calling thread
/// and return everything it displayed. `seeds` replaces the grid fill
/// with explicit per-worker particle sets.
fn run_simulation(
    params: SimulationParameters,
    num_workers: usize,
    script: Vec<(u64, ControlEvent)>,
    seeds: Option<Vec<Vec<Particle>>>,
) -> Vec<(Vec<Vec2>, Vec<usize>)> {
    let mut comms = Comms::local(num_workers + 1);
    let coordinator_comms = comms.remove(0);
    let handles: Vec<_> = comms
        .into_iter()
        .enumerate()
        .map(|(index, comms)| {
            let params = params.clone();
            let seed = seeds.as_ref().map(|seeds| seeds[index].clone());
            thread::spawn(move || {
                let mut worker = match seed {
                    Some(particles) => Worker::with_particles(comms, &params, particles),
                    None => Worker::new(comms, &params),
                };
                worker.run();
            })
        })
        .collect();
    let mut display = RecordingDisplay::default();
    let mut controls = ScriptedControls::new(script);
    let mut coordinator = Coordinator::new(coordinator_comms, params).unwrap();
    coordinator.run(&mut display, &mut controls);
    for handle in handles {
        handle.join().unwrap();
    }
    display.frames
}

fn seeded(pos: Vec2, velocity: Vec2) -> Particle {
    let mut particle = Particle::at(pos);
    particle.velocity = velocity;
    particle
}

fn total_count(frame: &(Vec<Vec2>, Vec<usize>)) -> usize {
    frame.1.iter().sum()
}

#[test]
fn free_fall_accelerates_the_fluid_downward() {
    let params = SimulationParameters {
        max_x: 20.0,
        max_y: 100.0,
        gravity: 9.0,
        smoothing_radius: 0.2,
        dt: 1.0 / 60.0,
        steps_per_frame: 1,
        mover_radius: 0.0,
        max_frames: Some(60),
        ..Default::default()
    };
    // A 10 x 10 block spaced wider than the kernel support, so every
    // particle falls ballistically.
    let spacing = 0.25;
    let seeds: Vec<Particle> = (0..10)
        .flat_map(|i| {
            (0..10).map(move |j| {
                Particle::at(Vec2::new(
                    5.0 + i as f32 * spacing,
                    90.0 + j as f32 * spacing,
                ))
            })
        })
        .collect();
    let initial: Vec<Vec2> = seeds.iter().map(|p| p.pos).collect();
    let frames = run_simulation(params, 1, vec![], Some(vec![seeds]));
    assert_eq!(frames.len(), 60);
    let last = &frames[frames.len() - 1].0;
    assert_eq!(last.len(), initial.len());
    // 60 substeps of dt = 1/60 at g = 9; the discrete sum beats the
    // continuous 0.5 g t^2 bound.
    let expected_drop = 0.5 * 9.0 * 1.0;
    for (position, start) in last.iter().zip(initial.iter()) {
        assert!(position.y <= start.y + 0.01);
        assert!(
            start.y - position.y >= expected_drop - 0.02,
            "dropped only {}",
            start.y - position.y
        );
    }
}

#[test]
fn fast_particle_is_clamped_at_the_domain_edge() {
    let params = SimulationParameters {
        gravity: 0.0,
        steps_per_frame: 1,
        mover_radius: 0.0,
        max_frames: Some(1),
        ..Default::default()
    };
    let max_x = params.max_x;
    let seeds = vec![vec![seeded(
        Vec2::new(max_x - 1e-4, 0.5),
        Vec2::new(1.0, 0.0),
    )]];
    let frames = run_simulation(params, 1, vec![], Some(seeds));
    let position = frames[0].0[0];
    let expected = crate::messages::unpack_coord(
        crate::messages::pack_coord(max_x - 1e-3, max_x),
        max_x,
    );
    assert!(
        (position.x - expected).abs() < 1e-5,
        "x = {}, expected the clamped edge {}",
        position.x,
        expected
    );
}

#[test]
fn migrating_particle_changes_owner_and_mass_is_conserved() {
    let params = SimulationParameters {
        gravity: 0.0,
        steps_per_frame: 1,
        mover_radius: 0.0,
        max_frames: Some(10),
        ..Default::default()
    };
    let boundary = params.max_x / 2.0;
    let seeds = vec![
        vec![seeded(Vec2::new(boundary - 0.05, 5.0), Vec2::new(1.0, 0.0))],
        vec![],
    ];
    let frames = run_simulation(params, 2, vec![], Some(seeds));
    assert_eq!(frames[0].1, vec![1, 0]);
    for frame in &frames {
        assert_eq!(total_count(frame), 1);
    }
    assert_eq!(frames[frames.len() - 1].1, vec![0, 1]);
}

#[test]
fn particles_inside_the_mover_are_expelled() {
    let params = SimulationParameters {
        gravity: 0.0,
        steps_per_frame: 1,
        mover_radius: 1.0,
        max_frames: Some(1),
        ..Default::default()
    };
    let center = params.extent().center();
    let seeds: Vec<Particle> = (0..8)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / 8.0;
            Particle::at(center + 0.3 * Vec2::new(angle.cos(), angle.sin()))
        })
        .collect();
    let frames = run_simulation(params, 1, vec![], Some(vec![seeds]));
    for position in &frames[0].0 {
        assert!(
            position.distance(center) >= 0.99,
            "{:?} is still inside the mover",
            position
        );
    }
}

#[test]
fn kill_event_shuts_all_ranks_down() {
    let params = SimulationParameters {
        max_x: 6.0,
        max_y: 3.0,
        spacing: 0.2,
        smoothing_radius: 0.4,
        steps_per_frame: 2,
        mover_radius: 0.0,
        max_frames: None,
        ..Default::default()
    };
    let script = vec![(3, ControlEvent::Kill)];
    let frames = run_simulation(params, 3, script, None);
    // The kill scatter goes out with frame 3; every rank finishes that
    // frame and stops. Reaching this line at all means the workers
    // joined.
    assert_eq!(frames.len(), 4);
    let initial = total_count(&frames[0]);
    assert!(initial > 0);
    for frame in &frames {
        assert_eq!(total_count(frame), initial);
    }
}

#[test]
fn gathered_positions_stay_inside_the_domain() {
    let params = SimulationParameters {
        max_x: 6.0,
        max_y: 3.0,
        spacing: 0.2,
        smoothing_radius: 0.4,
        steps_per_frame: 2,
        mover_radius: 0.0,
        max_frames: Some(6),
        ..Default::default()
    };
    let max_x = params.max_x;
    let max_y = params.max_y;
    let frames = run_simulation(params, 2, vec![], None);
    // Decoding wobbles by one quantization step at most.
    let slack_x = max_x / i16::MAX as f32;
    let slack_y = max_y / i16::MAX as f32;
    for (positions, _) in &frames {
        for position in positions {
            assert!(position.x >= -slack_x && position.x <= max_x + slack_x);
            assert!(position.y >= -slack_y && position.y <= max_y + slack_y);
        }
    }
}

#[test]
fn retire_and_restore_conserves_mass() {
    let params = SimulationParameters {
        max_x: 8.0,
        max_y: 3.0,
        spacing: 0.2,
        smoothing_radius: 0.4,
        steps_per_frame: 2,
        mover_radius: 0.0,
        capacity_factor: 3.0,
        max_frames: Some(8),
        ..Default::default()
    };
    let script = vec![
        (1, ControlEvent::RemovePartition),
        (3, ControlEvent::AddPartition),
    ];
    let frames = run_simulation(params, 4, script, None);
    let initial = total_count(&frames[0]);
    assert!(initial > 0);
    for frame in &frames {
        assert_eq!(total_count(frame), initial, "counts {:?}", frame.1);
    }
    // The retired worker reports empty frames while parked and owns
    // particles again after the split.
    assert_eq!(frames[2].1[3], 0);
    let last = &frames[frames.len() - 1];
    assert!(last.1[3] > 0, "counts {:?}", last.1);
}
