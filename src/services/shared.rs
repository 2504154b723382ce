//! Shared simulation state for the HTTP service.
//!
//! `SharedSimulation` wraps one [`SimulationController`] so handlers running
//! on different tokio workers drive the same run. Map reads go straight to
//! the [`TrackMonitor`] and never wait on the controller lock, which
//! `end()` holds while it joins the train threads.
//!
//! ```ignore
//! let shared = Arc::new(SharedSimulation::new(controller));
//! let map = shared.map();
//! shared.with_controller(|sim| sim.pause());
//! if let Some(map) = shared.check_changes() {
//!     // redraw
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::{Coordinates, Phase, SimulationController, TrackMonitor, TrainState};

use super::api::{FieldResponse, MapResponse};

/// Last occupancy generation seen by [`SharedSimulation::check_changes`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeDetection {
    /// Generation of the last reported map.
    pub last_generation: u64,
}

/// One simulation shared between every service.
pub struct SharedSimulation {
    controller: Mutex<SimulationController>,
    monitor: Arc<TrackMonitor>,
    start_time: Instant,
    change_detection: Mutex<ChangeDetection>,
}

impl SharedSimulation {
    /// Wrap a controller.
    pub fn new(controller: SimulationController) -> Self {
        let monitor = Arc::clone(controller.monitor());
        let last_generation = monitor.generation();
        Self {
            controller: Mutex::new(controller),
            monitor,
            start_time: Instant::now(),
            change_detection: Mutex::new(ChangeDetection { last_generation }),
        }
    }

    /// Milliseconds since this state was created.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// The monitor of the wrapped run.
    pub fn monitor(&self) -> &Arc<TrackMonitor> {
        &self.monitor
    }

    /// Run `f` with the controller locked.
    ///
    /// The closure keeps the lock from being held across an await point.
    pub fn with_controller<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut SimulationController) -> R,
    {
        let mut guard = self.lock_controller();
        f(&mut guard)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lock_controller().phase()
    }

    /// Snapshot of the whole map.
    pub fn map(&self) -> MapResponse {
        MapResponse::from_monitor(&self.monitor)
    }

    /// Description of one tile, `None` off the map.
    pub fn field(&self, at: Coordinates) -> Option<FieldResponse> {
        FieldResponse::from_monitor(&self.monitor, at)
    }

    /// Display state of every train, in launch order.
    pub fn trains(&self) -> Vec<TrainState> {
        self.lock_controller().train_states()
    }

    /// The map if occupancy changed since the last call, `None` otherwise.
    pub fn check_changes(&self) -> Option<MapResponse> {
        let map = self.map();
        let mut detection = self
            .change_detection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map.generation == detection.last_generation {
            return None;
        }
        detection.last_generation = map.generation;
        Some(map)
    }

    fn lock_controller(&self) -> MutexGuard<'_, SimulationController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
