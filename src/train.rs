//! Train units: one thread per train driving it along its route.
//!
//! A [`TrainUnit`] owns its route cursor and repeatedly asks the
//! [`TrackMonitor`] to slide its window one tile forward. Lifecycle
//! requests arrive through a shared [`TrainControl`] and are observed at
//! one safe point, right before each advance:
//!
//! ```text
//! Created ──► Running ◄──► Paused
//!                │            │
//!                └──► Stopped ◄┘
//! ```
//!
//! A paused unit holds no monitor lock. A stop request wakes the unit
//! out of a pause, a pacing delay, or (together with
//! [`TrackMonitor::interrupt`]) a blocked advance.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::config::{AdvanceMode, ShortString, TrainPlan};
use crate::coordinates::Coordinates;
use crate::error::MonitorError;
use crate::field::TrainId;
use crate::monitor::{Advance, TrackMonitor};
use crate::route::{Route, RouteMode};

/// Lifecycle status of a train unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrainStatus {
    /// Built but not started.
    #[default]
    Created,
    /// Advancing along its route.
    Running,
    /// Suspended before its next advance.
    Paused,
    /// Terminal.
    Stopped,
}

/// Snapshot of one train for display.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainState {
    /// Train identity.
    pub train: TrainId,
    /// Display name.
    pub name: ShortString,
    /// Lifecycle status.
    pub status: TrainStatus,
    /// Tiles currently covered, head first.
    pub window: Vec<Coordinates>,
    /// Route index of the head.
    pub cursor: usize,
    /// Whether the train runs in its configured direction.
    pub forward: bool,
    /// Completed one-way runs.
    pub runs: u32,
    /// Committed advances.
    pub moves: u64,
    /// Tile the train last found taken, while it is waiting for it.
    pub blocked_at: Option<Coordinates>,
}

impl TrainState {
    fn new(plan: &TrainPlan) -> Self {
        Self {
            train: plan.id,
            name: plan.name.clone(),
            status: TrainStatus::Created,
            window: plan.initial_window(),
            cursor: plan.wagons.saturating_sub(1),
            forward: true,
            runs: 0,
            moves: 0,
            blocked_at: None,
        }
    }

    /// Front tile.
    pub fn head(&self) -> Option<Coordinates> {
        self.window.first().copied()
    }

    /// Rear tile.
    pub fn tail(&self) -> Option<Coordinates> {
        self.window.last().copied()
    }
}

/// Progress notification sent by a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainEvent {
    /// The unit thread began running.
    Started {
        /// Train.
        train: TrainId,
    },
    /// An advance committed.
    Moved {
        /// Train.
        train: TrainId,
        /// New head tile.
        head: Coordinates,
        /// Tile left behind, if any.
        freed: Option<Coordinates>,
    },
    /// The next tile is held by another train.
    Blocked {
        /// Train.
        train: TrainId,
        /// Contested tile.
        at: Coordinates,
    },
    /// The unit suspended at its safe point.
    Paused {
        /// Train.
        train: TrainId,
    },
    /// The unit left a pause.
    Resumed {
        /// Train.
        train: TrainId,
    },
    /// A shuttle turned around.
    Reversed {
        /// Train.
        train: TrainId,
    },
    /// The route (or lap budget) is complete.
    Finished {
        /// Train.
        train: TrainId,
    },
    /// The monitor rejected a move as a contract violation.
    Faulted {
        /// Train.
        train: TrainId,
        /// The violation.
        error: MonitorError,
    },
    /// The unit was stopped from outside.
    Interrupted {
        /// Train.
        train: TrainId,
    },
}

/// Why a unit stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the end of its route or lap budget.
    Finished,
    /// Stopped by a stop request.
    Interrupted,
    /// A contract violation; the unit kept its tiles.
    Faulted(MonitorError),
}

impl StopReason {
    /// Whether the unit stopped on a contract violation.
    pub fn is_faulted(&self) -> bool {
        matches!(self, StopReason::Faulted(_))
    }
}

/// Final account of a unit, returned by its thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainReport {
    /// Train.
    pub train: TrainId,
    /// Why it stopped.
    pub reason: StopReason,
    /// Committed advances.
    pub moves: u64,
    /// Completed one-way runs.
    pub runs: u32,
}

#[derive(Debug)]
struct ControlInner {
    state: TrainState,
    stop_requested: bool,
    parked: bool,
}

/// Lifecycle flags and display state of one unit, shared between the
/// unit thread and its controller.
#[derive(Debug)]
pub struct TrainControl {
    inner: Mutex<ControlInner>,
    signal: Condvar,
}

impl TrainControl {
    /// Control block for a train about to be built from `plan`.
    pub fn new(plan: &TrainPlan) -> Self {
        Self {
            inner: Mutex::new(ControlInner {
                state: TrainState::new(plan),
                stop_requested: false,
                parked: false,
            }),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current status.
    pub fn status(&self) -> TrainStatus {
        self.lock().state.status
    }

    /// Copy of the display state.
    pub fn snapshot(&self) -> TrainState {
        self.lock().state.clone()
    }

    /// Request a pause. Running (or not yet started) units pause before
    /// their next advance. Returns whether anything changed.
    pub fn pause(&self) -> bool {
        let mut inner = self.lock();
        match inner.state.status {
            TrainStatus::Created | TrainStatus::Running => {
                inner.state.status = TrainStatus::Paused;
                true
            }
            TrainStatus::Paused | TrainStatus::Stopped => false,
        }
    }

    /// Resume a paused unit from the same route position. Returns whether
    /// anything changed.
    pub fn restart(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.status != TrainStatus::Paused {
            return false;
        }
        inner.state.status = TrainStatus::Running;
        self.signal.notify_all();
        true
    }

    /// Ask the unit to stop at its next safe point, waking it from a pause
    /// or a pacing delay.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.stop_requested = true;
        self.signal.notify_all();
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Whether the unit is suspended inside a pause right now.
    pub fn is_parked(&self) -> bool {
        self.lock().parked
    }

    /// Block until a requested pause has taken effect, the unit stopped,
    /// or `timeout` passed. Returns whether the unit is settled.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .signal
            .wait_timeout_while(inner, timeout, |i| {
                i.state.status == TrainStatus::Paused && !i.parked
            })
            .unwrap_or_else(PoisonError::into_inner);
        inner.state.status != TrainStatus::Paused || inner.parked
    }

    /// Block until the unit has stopped or `timeout` passed.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .signal
            .wait_timeout_while(inner, timeout, |i| i.state.status != TrainStatus::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        inner.state.status == TrainStatus::Stopped
    }

    fn begin(&self) {
        let mut inner = self.lock();
        if inner.state.status == TrainStatus::Created {
            inner.state.status = TrainStatus::Running;
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self.lock();
        inner.state.status = TrainStatus::Stopped;
        inner.state.blocked_at = None;
        inner.parked = false;
        self.signal.notify_all();
    }

    fn update(&self, f: impl FnOnce(&mut TrainState)) {
        f(&mut self.lock().state);
    }

    /// Safe point: park while paused, calling `on_park` once when the
    /// unit suspends. `None` means stop, `Some(true)` a resumed pause.
    fn checkpoint(&self, on_park: impl FnOnce()) -> Option<bool> {
        let mut inner = self.lock();
        let mut parked = false;
        let mut on_park = Some(on_park);
        while inner.state.status == TrainStatus::Paused && !inner.stop_requested {
            if !inner.parked {
                inner.parked = true;
                parked = true;
                if let Some(f) = on_park.take() {
                    f();
                }
                self.signal.notify_all();
            }
            inner = self.signal.wait(inner).unwrap_or_else(PoisonError::into_inner);
        }
        inner.parked = false;
        if inner.stop_requested {
            None
        } else {
            Some(parked)
        }
    }

    /// Sleep for `duration` unless a stop arrives first. Returns `false`
    /// on stop.
    fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_stop_requested();
        }
        let deadline = Instant::now() + duration;
        let mut inner = self.lock();
        while !inner.stop_requested {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            inner = self
                .signal
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        !inner.stop_requested
    }
}

/// Pacing and retry settings shared by every unit of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UnitSettings {
    /// Delay after each committed advance.
    pub step_delay: Duration,
    /// Blocking or polling advances.
    pub advance_mode: AdvanceMode,
}

/// Outcome of one attempt to slide the window.
enum Step {
    Moved,
    Waiting,
    Turned,
}

/// Drives one train.
pub struct TrainUnit {
    id: TrainId,
    route: Route,
    wagons: usize,
    mode: RouteMode,
    laps: Option<u32>,
    cursor: usize,
    runs: u32,
    moves: u64,
    stalled: u32,
    monitor: Arc<TrackMonitor>,
    control: Arc<TrainControl>,
    events: Option<SyncSender<TrainEvent>>,
    settings: UnitSettings,
}

impl TrainUnit {
    /// Build a unit for `plan`. The train must already be placed on its
    /// initial window.
    pub fn new(
        plan: &TrainPlan,
        monitor: Arc<TrackMonitor>,
        control: Arc<TrainControl>,
        events: Option<SyncSender<TrainEvent>>,
        settings: UnitSettings,
    ) -> Self {
        Self {
            id: plan.id,
            route: plan.route.clone(),
            wagons: plan.wagons,
            mode: plan.mode,
            laps: plan.laps,
            cursor: plan.wagons.saturating_sub(1),
            runs: 0,
            moves: 0,
            stalled: 0,
            monitor,
            control,
            events,
            settings,
        }
    }

    /// Run the unit on its own named thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<TrainReport>> {
        thread::Builder::new()
            .name(format!("train-{}", self.id))
            .spawn(move || self.run())
    }

    /// Run the unit on the current thread until it stops.
    ///
    /// A finished or interrupted unit releases every tile it holds. A
    /// faulted unit keeps them so the failure stays visible; its owner
    /// releases them later.
    pub fn run(mut self) -> TrainReport {
        let monitor = Arc::clone(&self.monitor);
        let _service = monitor.enter_service();
        self.control.begin();
        info!("{}: started", self.id);
        self.emit(TrainEvent::Started { train: self.id });

        let reason = self.drive();
        match &reason {
            StopReason::Finished | StopReason::Interrupted => {
                monitor.release_train(self.id);
                self.control.update(|s| s.window.clear());
            }
            StopReason::Faulted(e) => warn!("{}: stopped on contract violation: {e}", self.id),
        }
        self.control.finish();

        let event = match &reason {
            StopReason::Finished => TrainEvent::Finished { train: self.id },
            StopReason::Interrupted => TrainEvent::Interrupted { train: self.id },
            StopReason::Faulted(error) => TrainEvent::Faulted {
                train: self.id,
                error: error.clone(),
            },
        };
        self.emit(event);
        info!("{}: stopped after {} move(s) ({:?})", self.id, self.moves, reason);

        TrainReport {
            train: self.id,
            reason,
            moves: self.moves,
            runs: self.runs,
        }
    }

    fn drive(&mut self) -> StopReason {
        loop {
            let id = self.id;
            match self.control.checkpoint(|| self.emit(TrainEvent::Paused { train: id })) {
                None => return StopReason::Interrupted,
                Some(true) => self.emit(TrainEvent::Resumed { train: self.id }),
                Some(false) => {}
            }

            if self.cursor + 1 >= self.route.len() {
                self.runs += 1;
                let runs = self.runs;
                self.control.update(|s| s.runs = runs);
                let done = match self.mode {
                    RouteMode::OneWay => true,
                    // A shuttle filling its whole route has nowhere to go
                    RouteMode::Shuttle => {
                        self.route.len() <= self.wagons
                            || self.laps.is_some_and(|laps| runs >= laps)
                    }
                };
                if done {
                    return StopReason::Finished;
                }
                self.reverse();
                continue;
            }

            let (Some(old), Some(new)) = (
                self.route.window(self.cursor, self.wagons),
                self.route.window(self.cursor + 1, self.wagons),
            ) else {
                return StopReason::Faulted(MonitorError::MalformedWindow);
            };

            match self.step(&old, &new) {
                Ok(Step::Moved) => {
                    if !self.control.sleep(self.settings.step_delay) {
                        return StopReason::Interrupted;
                    }
                }
                Ok(Step::Waiting) | Ok(Step::Turned) => {}
                Err(MonitorError::Interrupted { .. }) => return StopReason::Interrupted,
                Err(e) => return StopReason::Faulted(e),
            }
        }
    }

    fn step(&mut self, old: &[Coordinates], new: &[Coordinates]) -> Result<Step, MonitorError> {
        // A non-waiting attempt first, so a contested tile is reported
        // before the unit goes to sleep on it.
        match self.monitor.move_to_next_station(old, new, self.id, false)? {
            Advance::Moved => {
                self.committed(old, new);
                return Ok(Step::Moved);
            }
            Advance::Blocked { at } => self.blocked(at),
        }

        match self.settings.advance_mode {
            AdvanceMode::Blocking => {
                match self.monitor.move_to_next_station(old, new, self.id, true)? {
                    Advance::Moved => {
                        self.committed(old, new);
                        Ok(Step::Moved)
                    }
                    Advance::Blocked { .. } => Ok(Step::Waiting),
                }
            }
            AdvanceMode::Polling(backoff) => {
                let turn = self.mode == RouteMode::Shuttle
                    && backoff.reverse_after.is_some_and(|n| self.stalled >= n);
                if turn {
                    debug!("{}: stalled {} time(s), turning around", self.id, self.stalled);
                    self.reverse();
                    return Ok(Step::Turned);
                }
                let delay = Duration::from_millis(backoff.delay_ms(self.stalled - 1));
                if !self.control.sleep(delay) {
                    return Err(MonitorError::Interrupted { train: self.id });
                }
                Ok(Step::Waiting)
            }
        }
    }

    fn blocked(&mut self, at: Coordinates) {
        if self.stalled == 0 {
            trace!("{}: blocked at {at}", self.id);
            self.emit(TrainEvent::Blocked { train: self.id, at });
            self.control.update(|s| s.blocked_at = Some(at));
        }
        self.stalled += 1;
    }

    fn committed(&mut self, old: &[Coordinates], new: &[Coordinates]) {
        self.cursor += 1;
        self.moves += 1;
        self.stalled = 0;
        let (cursor, moves) = (self.cursor, self.moves);
        let window = new.to_vec();
        self.control.update(|s| {
            s.window = window;
            s.cursor = cursor;
            s.moves = moves;
            s.blocked_at = None;
        });
        if let Some(&head) = new.first() {
            let freed = old.iter().find(|c| !new.contains(c)).copied();
            self.emit(TrainEvent::Moved {
                train: self.id,
                head,
                freed,
            });
        }
    }

    /// Swap head and tail: the window keeps its tiles, the route flips.
    fn reverse(&mut self) {
        let len = self.route.len();
        self.route = self.route.reversed();
        self.cursor = len + self.wagons - 2 - self.cursor;
        self.stalled = 0;
        let cursor = self.cursor;
        let window = self.route.window(cursor, self.wagons).unwrap_or_default();
        self.control.update(|s| {
            s.forward = !s.forward;
            s.cursor = cursor;
            s.window = window;
            s.blocked_at = None;
        });
        debug!("{}: reversed", self.id);
        self.emit(TrainEvent::Reversed { train: self.id });
    }

    fn emit(&self, event: TrainEvent) {
        let Some(tx) = &self.events else { return };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => trace!("{}: event queue full, dropped {event:?}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackoffConfig, LayoutConfig, SimulationConfig, TrainConfig};
    use crate::grid::TunnelsGrid;
    use std::sync::mpsc;

    fn c(row: usize, col: usize) -> Coordinates {
        Coordinates::new(row, col)
    }

    fn plan(rows: &[&str], train: TrainConfig, wagons: usize) -> (TunnelsGrid, TrainPlan) {
        let config = SimulationConfig::empty()
            .with_layout(LayoutConfig::rows(rows))
            .with_train(train)
            .with_train_length(wagons);
        let grid = config.build_grid().unwrap();
        let plan = config.plan_trains(&grid).unwrap().remove(0);
        (grid, plan)
    }

    fn unit(
        monitor: &Arc<TrackMonitor>,
        plan: &TrainPlan,
        settings: UnitSettings,
    ) -> (TrainUnit, Arc<TrainControl>, mpsc::Receiver<TrainEvent>) {
        monitor.place_train(plan.id, &plan.initial_window()).unwrap();
        let control = Arc::new(TrainControl::new(plan));
        let (tx, rx) = mpsc::sync_channel(256);
        let unit = TrainUnit::new(plan, monitor.clone(), control.clone(), Some(tx), settings);
        (unit, control, rx)
    }

    #[test]
    fn one_way_train_runs_to_end_and_releases() {
        let (grid, plan) = plan(
            &["......"],
            TrainConfig::new(TrainId(1), "a").with_endpoints(c(0, 0), c(0, 5)),
            2,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        let (unit, control, rx) = unit(&monitor, &plan, UnitSettings::default());

        let report = unit.run();
        assert_eq!(report.reason, StopReason::Finished);
        assert_eq!(report.moves, 4);
        assert_eq!(control.status(), TrainStatus::Stopped);
        assert!(monitor.occupied_cells().is_empty());
        assert_eq!(monitor.active_units(), 0);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.first(), Some(&TrainEvent::Started { train: TrainId(1) }));
        assert_eq!(events.last(), Some(&TrainEvent::Finished { train: TrainId(1) }));
        assert_eq!(
            events.iter().filter(|e| matches!(e, TrainEvent::Moved { .. })).count(),
            4
        );
    }

    #[test]
    fn shuttle_reverses_and_counts_laps() {
        let (grid, plan) = plan(
            &["...."],
            TrainConfig::new(TrainId(2), "s")
                .with_endpoints(c(0, 0), c(0, 3))
                .with_mode(RouteMode::Shuttle)
                .with_laps(3),
            2,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        let (unit, _control, rx) = unit(&monitor, &plan, UnitSettings::default());

        let report = unit.run();
        assert_eq!(report.reason, StopReason::Finished);
        assert_eq!(report.runs, 3);
        assert_eq!(report.moves, 6);
        let reversals = rx
            .try_iter()
            .filter(|e| matches!(e, TrainEvent::Reversed { .. }))
            .count();
        assert_eq!(reversals, 2);
    }

    #[test]
    fn wall_on_route_faults_without_releasing() {
        let (grid, plan) = plan(
            &["..#."],
            TrainConfig::new(TrainId(3), "w")
                .with_route(vec![c(0, 0), c(0, 1), c(0, 2), c(0, 3)]),
            1,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        let (unit, control, _rx) = unit(&monitor, &plan, UnitSettings::default());

        let report = unit.run();
        assert_eq!(
            report.reason,
            StopReason::Faulted(MonitorError::WallCell { at: c(0, 2) })
        );
        assert_eq!(control.status(), TrainStatus::Stopped);
        assert_eq!(monitor.occupied_cells(), vec![(c(0, 1), TrainId(3))]);
    }

    #[test]
    fn shuttle_filling_its_route_finishes_instead_of_turning() {
        let grid = TunnelsGrid::new(3, 1).unwrap();
        let route = Route::new(TrainId(4), vec![c(0, 0), c(0, 1)], 2, &grid).unwrap();
        let plan = TrainPlan {
            id: TrainId(4),
            name: crate::config::short_string("full"),
            route,
            wagons: 2,
            mode: RouteMode::Shuttle,
            laps: None,
        };
        let monitor = Arc::new(TrackMonitor::new(grid));
        let (unit, _control, rx) = unit(&monitor, &plan, UnitSettings::default());

        let report = unit.run();
        assert_eq!(report.reason, StopReason::Finished);
        assert_eq!(report.runs, 1);
        assert_eq!(report.moves, 0);
        assert!(!rx.try_iter().any(|e| matches!(e, TrainEvent::Reversed { .. })));
        assert!(monitor.occupied_cells().is_empty());
    }

    #[test]
    fn control_transitions_are_idempotent() {
        let (_grid, plan) = plan(
            &["..."],
            TrainConfig::new(TrainId(1), "x").with_endpoints(c(0, 0), c(0, 2)),
            1,
        );
        let control = TrainControl::new(&plan);
        assert!(!control.restart());
        assert!(control.pause());
        assert!(!control.pause());
        assert_eq!(control.status(), TrainStatus::Paused);
        assert!(control.restart());
        assert!(!control.restart());
        assert_eq!(control.status(), TrainStatus::Running);
    }

    #[test]
    fn paused_unit_parks_and_resumes() {
        let (grid, plan) = plan(
            &["......"],
            TrainConfig::new(TrainId(1), "p").with_endpoints(c(0, 0), c(0, 5)),
            1,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        let (unit, control, rx) = unit(&monitor, &plan, UnitSettings::default());

        control.pause();
        let handle = unit.spawn().unwrap();
        assert!(control.wait_until_settled(Duration::from_secs(5)));
        assert!(control.is_parked());
        assert_eq!(monitor.occupant(c(0, 0)), Some(TrainId(1)));

        control.restart();
        let report = handle.join().unwrap();
        assert_eq!(report.reason, StopReason::Finished);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&TrainEvent::Paused { train: TrainId(1) }));
        assert!(events.contains(&TrainEvent::Resumed { train: TrainId(1) }));
    }

    #[test]
    fn polling_shuttle_turns_around_when_stalled() {
        let (grid, plan) = plan(
            &["....."],
            TrainConfig::new(TrainId(1), "t")
                .with_endpoints(c(0, 0), c(0, 4))
                .with_mode(RouteMode::Shuttle)
                .with_laps(1),
            1,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        monitor.place_train(TrainId(9), &[c(0, 2)]).unwrap();
        let settings = UnitSettings {
            step_delay: Duration::ZERO,
            advance_mode: AdvanceMode::Polling(
                BackoffConfig::default()
                    .with_initial_ms(1)
                    .with_max_ms(2)
                    .with_reverse_after(Some(3)),
            ),
        };
        let (unit, _control, rx) = unit(&monitor, &plan, settings);

        // Blocked at (0,2), turns back and finishes its single run at (0,0)
        let report = unit.run();
        assert_eq!(report.reason, StopReason::Finished);
        assert_eq!(report.moves, 2);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&TrainEvent::Blocked {
            train: TrainId(1),
            at: c(0, 2)
        }));
        assert!(events.contains(&TrainEvent::Reversed { train: TrainId(1) }));
        assert_eq!(monitor.occupied_cells(), vec![(c(0, 2), TrainId(9))]);
    }

    #[test]
    fn stop_wakes_blocked_unit() {
        let (grid, plan) = plan(
            &["...."],
            TrainConfig::new(TrainId(1), "b").with_endpoints(c(0, 0), c(0, 3)),
            1,
        );
        let monitor = Arc::new(TrackMonitor::new(grid));
        monitor.place_train(TrainId(2), &[c(0, 1)]).unwrap();
        let (unit, control, _rx) = unit(&monitor, &plan, UnitSettings::default());

        let handle = unit.spawn().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !monitor.is_cell_contended(c(0, 1)) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        control.stop();
        monitor.interrupt(TrainId(1));

        let report = handle.join().unwrap();
        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(monitor.occupied_cells(), vec![(c(0, 1), TrainId(2))]);
    }
}
