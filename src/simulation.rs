//! Simulation lifecycle: setup, start, pause, restart and end.
//!
//! [`SimulationController`] turns a [`SimulationConfig`] into a painted,
//! populated [`TrackMonitor`] and one [`TrainUnit`] thread per train. It
//! only orchestrates; every exclusion decision stays inside the monitor.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rs_metro::{SimulationConfig, SimulationController};
//!
//! let mut sim = SimulationController::new(SimulationConfig::default())?;
//! sim.start()?;
//! std::thread::sleep(Duration::from_secs(2));
//! sim.pause();
//! println!("{}", sim.monitor().render_ascii());
//! sim.restart();
//! let _report = sim.end()?;
//! assert!(sim.monitor().occupied_cells().is_empty());
//! # Ok::<(), rs_metro::SimulationError>(())
//! ```

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::{SimulationConfig, TrainPlan};
use crate::coordinates::Coordinates;
use crate::error::SimulationError;
use crate::field::{FieldType, TrainId};
use crate::monitor::TrackMonitor;
use crate::train::{TrainControl, TrainEvent, TrainReport, TrainState, TrainStatus, TrainUnit, UnitSettings};

/// Capacity of the train event queue. Events beyond it are dropped until
/// the receiver catches up.
pub const EVENT_QUEUE_CAPACITY: usize = 4096;

/// Where the controller is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Trains are placed, no unit runs yet.
    Ready,
    /// Units have been launched.
    Running,
    /// `end()` completed.
    Ended,
}

/// What `end()` found when it shut the simulation down.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Reports of every unit that was joined, in launch order.
    pub reports: Vec<TrainReport>,
    /// Units whose thread panicked.
    pub panicked: Vec<TrainId>,
    /// Tiles still held after the units stopped (faulted or never
    /// started trains) and released by the controller.
    pub released_cells: usize,
    /// Time since `start()`, if the simulation was started.
    pub elapsed: Option<Duration>,
}

struct Unit {
    plan: TrainPlan,
    control: Arc<TrainControl>,
    handle: Option<JoinHandle<TrainReport>>,
}

/// Owns the monitor and every train unit of one run.
pub struct SimulationController {
    config: SimulationConfig,
    monitor: Arc<TrackMonitor>,
    units: Vec<Unit>,
    events_tx: SyncSender<TrainEvent>,
    events_rx: Option<Receiver<TrainEvent>>,
    phase: Phase,
    started_at: Option<Instant>,
}

impl SimulationController {
    /// Validate `config`, build and paint the map, and place every train on
    /// its initial window. No thread is started.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let grid = config.build_grid()?;
        let plans = config.plan_trains(&grid)?;
        let monitor = Arc::new(TrackMonitor::new(grid));

        if config.paint_routes {
            let mut painter = monitor.begin_painting()?;
            for plan in &plans {
                for &at in plan.route.cells() {
                    // Unusable tiles are left for the unit to run into
                    if painter.get_field(at).is_some_and(FieldType::is_traversable) {
                        painter.begin_course(at, plan.id)?;
                    }
                }
            }
            monitor.end_painting(painter);
        }

        for plan in &plans {
            monitor.place_train(plan.id, &plan.initial_window())?;
        }

        let (events_tx, events_rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
        let units = plans
            .into_iter()
            .map(|plan| Unit {
                control: Arc::new(TrainControl::new(&plan)),
                plan,
                handle: None,
            })
            .collect();

        info!(
            "simulation ready: {}x{} map, {} train(s)",
            monitor.width(),
            monitor.height(),
            config.trains.len()
        );

        Ok(Self {
            config,
            monitor,
            units,
            events_tx,
            events_rx: Some(events_rx),
            phase: Phase::Ready,
            started_at: None,
        })
    }

    /// Launch one unit per train in the configured start order.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        match self.phase {
            Phase::Ready => {}
            Phase::Running => return Err(SimulationError::AlreadyStarted),
            Phase::Ended => return Err(SimulationError::Ended),
        }
        self.phase = Phase::Running;
        self.started_at = Some(Instant::now());

        let settings = UnitSettings {
            step_delay: Duration::from_millis(self.config.step_delay_ms),
            advance_mode: self.config.advance_mode,
        };
        let stagger = Duration::from_millis(self.config.start_stagger_ms);

        for (i, unit) in self.units.iter_mut().enumerate() {
            if i > 0 && !stagger.is_zero() {
                thread::sleep(stagger);
            }
            let train = TrainUnit::new(
                &unit.plan,
                Arc::clone(&self.monitor),
                Arc::clone(&unit.control),
                Some(self.events_tx.clone()),
                settings,
            );
            unit.handle = Some(train.spawn().map_err(SimulationError::Spawn)?);
        }
        info!("simulation started with {} unit(s)", self.units.len());
        Ok(())
    }

    /// Ask every unit to pause before its next advance. Returns how many
    /// units changed state.
    ///
    /// This only posts the request: a unit may still finish the advance it
    /// is in. Use [`pause_and_wait`](Self::pause_and_wait) to return once
    /// every running unit has suspended.
    pub fn pause(&self) -> usize {
        let changed = self.units.iter().filter(|u| u.control.pause()).count();
        info!("pause requested ({changed} unit(s) affected)");
        changed
    }

    /// Pause every unit and block until each running one has suspended
    /// (or stopped), at most `timeout`. Returns `false` on timeout; the
    /// pause request stays posted either way.
    pub fn pause_and_wait(&self, timeout: Duration) -> bool {
        self.pause();
        let parked = self.wait_until_parked(timeout);
        if !parked {
            warn!("units still moving {}ms after pause", timeout.as_millis());
        }
        parked
    }

    /// Resume every paused unit. Returns how many units changed state.
    pub fn restart(&self) -> usize {
        let changed = self.units.iter().filter(|u| u.control.restart()).count();
        info!("restart requested ({changed} unit(s) affected)");
        changed
    }

    /// Block until every unit asked to pause has actually suspended (or
    /// stopped), or `timeout` passes. Units that are not started never
    /// suspend, so this only waits on running ones.
    pub fn wait_until_parked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.units
            .iter()
            .filter(|u| u.handle.is_some())
            .all(|u| {
                let left = deadline.saturating_duration_since(Instant::now());
                u.control.wait_until_settled(left)
            })
    }

    /// Stop every unit, join every thread and release all occupancy.
    ///
    /// When this returns no unit is running and the map is empty.
    pub fn end(&mut self) -> Result<ShutdownReport, SimulationError> {
        if self.phase == Phase::Ended {
            return Err(SimulationError::Ended);
        }
        Ok(self.shutdown())
    }

    fn shutdown(&mut self) -> ShutdownReport {
        for unit in &self.units {
            unit.control.stop();
            self.monitor.interrupt(unit.plan.id);
        }

        let mut report = ShutdownReport {
            elapsed: self.started_at.map(|t| t.elapsed()),
            ..ShutdownReport::default()
        };
        for unit in &mut self.units {
            let Some(handle) = unit.handle.take() else { continue };
            match handle.join() {
                Ok(r) => report.reports.push(r),
                Err(_) => {
                    warn!("{}: unit thread panicked", unit.plan.id);
                    report.panicked.push(unit.plan.id);
                }
            }
        }

        for unit in &self.units {
            report.released_cells += self.monitor.release_train(unit.plan.id);
            unit.control.finish();
        }
        self.phase = Phase::Ended;
        info!(
            "simulation ended: {} unit(s) joined, {} tile(s) released",
            report.reports.len(),
            report.released_cells
        );
        report
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    /// The shared monitor.
    pub fn monitor(&self) -> &Arc<TrackMonitor> {
        &self.monitor
    }

    /// The configuration this run was built from.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of trains.
    pub fn number_of_trains(&self) -> usize {
        self.units.len()
    }

    /// First route tile of every train, in launch order.
    pub fn route_starts(&self) -> Vec<Coordinates> {
        self.units.iter().filter_map(|u| u.plan.route.start()).collect()
    }

    /// Last route tile of every train, in launch order.
    pub fn route_ends(&self) -> Vec<Coordinates> {
        self.units.iter().filter_map(|u| u.plan.route.end()).collect()
    }

    /// Resolved plan of every train, in launch order.
    pub fn plans(&self) -> impl Iterator<Item = &TrainPlan> {
        self.units.iter().map(|u| &u.plan)
    }

    /// Status of every train, in launch order.
    pub fn statuses(&self) -> Vec<(TrainId, TrainStatus)> {
        self.units
            .iter()
            .map(|u| (u.plan.id, u.control.status()))
            .collect()
    }

    /// Display snapshot of every train, in launch order.
    pub fn train_states(&self) -> Vec<TrainState> {
        self.units.iter().map(|u| u.control.snapshot()).collect()
    }

    /// Hand out the train event receiver. Only the first call gets it.
    pub fn take_events(&mut self) -> Option<Receiver<TrainEvent>> {
        self.events_rx.take()
    }
}

impl Drop for SimulationController {
    fn drop(&mut self) {
        if self.phase == Phase::Running {
            self.shutdown();
        }
    }
}
