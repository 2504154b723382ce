//! The track monitor: sole arbiter of which train occupies which tile.
//!
//! [`TrackMonitor`] owns the tunnel map and the runtime occupancy. Every
//! train movement goes through [`TrackMonitor::move_to_next_station`],
//! which checks, claims and releases tiles as one atomic step.
//!
//! # Locking
//!
//! | Lock | Guards | Held by |
//! |------|--------|---------|
//! | `labels` (`RwLock`) | tile labels, course book | [`Painter`] (write), moves and display (read) |
//! | `state` (`Mutex`) | occupancy, gate book, interrupt set | every move, briefly |
//!
//! A move takes `state` and then reads `labels`; a painter only ever takes
//! `labels`, so the two never wait on each other in opposite orders.
//!
//! The `state` mutex is held only for the check/claim/notify step. A train
//! that has to wait releases it and sleeps on the condition variable of
//! the one tile (or station entrance) it is waiting for, so trains on
//! unrelated tiles are never woken by each other's moves.
//!
//! # Example
//!
//! ```rust
//! use rs_metro::{Advance, Coordinates, TrackMonitor, TrainId, TunnelsGrid};
//!
//! let grid = TunnelsGrid::from_rows(&["....."]).unwrap();
//! let monitor = TrackMonitor::new(grid);
//! let c = |col| Coordinates::new(0, col);
//!
//! monitor.place_train(TrainId(1), &[c(1), c(0)]).unwrap();
//! monitor.place_train(TrainId(2), &[c(4)]).unwrap();
//!
//! // Head moves from (0,1) to (0,2), the tail follows
//! let step = monitor
//!     .move_to_next_station(&[c(1), c(0)], &[c(2), c(1)], TrainId(1), true)
//!     .unwrap();
//! assert_eq!(step, Advance::Moved);
//! assert_eq!(monitor.occupant(c(0)), None);
//! assert_eq!(monitor.occupant(c(2)), Some(TrainId(1)));
//!
//! // Without waiting, a move onto another train is reported, not performed
//! let step = monitor
//!     .move_to_next_station(&[c(2), c(1)], &[c(3), c(2)], TrainId(1), false)
//!     .unwrap();
//! assert!(step.is_moved());
//! let step = monitor
//!     .move_to_next_station(&[c(3), c(2)], &[c(4), c(3)], TrainId(1), false)
//!     .unwrap();
//! assert_eq!(step, Advance::Blocked { at: c(4) });
//! ```

use std::borrow::{Borrow, BorrowMut};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, trace};

use crate::coordinates::Coordinates;
use crate::error::MonitorError;
use crate::field::{FieldType, TrainId};
use crate::gate::{GateBook, StationGates};
use crate::grid::TunnelsGrid;

/// Result of a move request that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Advance {
    /// The train now occupies exactly the requested window.
    Moved,
    /// The train could not move yet and still occupies exactly its old
    /// window. Only returned when the caller asked not to wait.
    Blocked {
        /// First tile found held by another train.
        at: Coordinates,
    },
}

impl Advance {
    /// Whether the move was committed.
    pub fn is_moved(self) -> bool {
        self == Advance::Moved
    }
}

/// Tile labels plus the course book, guarded together by the paint lock.
#[derive(Debug)]
struct Labels {
    grid: TunnelsGrid,
    courses: HashMap<Coordinates, Vec<TrainId>>,
}

/// Runtime state guarded by the monitor mutex.
#[derive(Debug)]
struct MapState {
    occupancy: Vec<Option<TrainId>>,
    cell_waiting: Vec<usize>,
    book: GateBook,
    interrupted: HashSet<TrainId>,
    generation: u64,
}

impl Borrow<GateBook> for MapState {
    fn borrow(&self) -> &GateBook {
        &self.book
    }
}

impl BorrowMut<GateBook> for MapState {
    fn borrow_mut(&mut self) -> &mut GateBook {
        &mut self.book
    }
}

enum Blocker {
    Cell(Coordinates),
    Gate(Coordinates),
}

/// Thread-safe owner of the tunnel map and of tile occupancy.
///
/// Share it between trains with an `Arc`.
#[derive(Debug)]
pub struct TrackMonitor {
    labels: RwLock<Labels>,
    width: usize,
    height: usize,
    entrances: Vec<Coordinates>,
    state: Mutex<MapState>,
    cell_signals: Vec<Condvar>,
    gates: StationGates,
    supervisor: Condvar,
    active: AtomicUsize,
}

impl TrackMonitor {
    /// Take ownership of `grid`. The grid's station entrances become the
    /// monitor's gates and are fixed from here on.
    pub fn new(grid: TunnelsGrid) -> Self {
        let width = grid.width();
        let height = grid.height();
        let tiles = width * height;
        let entrances = grid.stations_entrances().to_vec();
        let gates = StationGates::new(&entrances);
        let book = gates.book();

        Self {
            labels: RwLock::new(Labels {
                grid,
                courses: HashMap::new(),
            }),
            width,
            height,
            entrances,
            state: Mutex::new(MapState {
                occupancy: vec![None; tiles],
                cell_waiting: vec![0; tiles],
                book,
                interrupted: HashSet::new(),
                generation: 0,
            }),
            cell_signals: (0..tiles).map(|_| Condvar::new()).collect(),
            gates,
            supervisor: Condvar::new(),
            active: AtomicUsize::new(0),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    /// Map width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map height.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Station entrance tiles.
    pub fn stations_entrances(&self) -> &[Coordinates] {
        &self.entrances
    }

    /// Whether `at` lies on the map.
    #[inline]
    pub fn contains(&self, at: Coordinates) -> bool {
        at.row < self.height && at.col < self.width
    }

    /// Current label of a tile. Only waits while a painter is active,
    /// which never overlaps with train movement.
    pub fn get_field(&self, at: Coordinates) -> Option<FieldType> {
        self.read_labels().grid.get(at)
    }

    /// A copy of the labelled grid.
    pub fn grid_snapshot(&self) -> TunnelsGrid {
        self.read_labels().grid.clone()
    }

    /// Trains whose painted course passes through `at`, oldest first.
    pub fn courses_through(&self, at: Coordinates) -> Vec<TrainId> {
        self.read_labels()
            .courses
            .get(&at)
            .cloned()
            .unwrap_or_default()
    }

    /// Train occupying `at` right now.
    pub fn occupant(&self, at: Coordinates) -> Option<TrainId> {
        let i = self.index(at)?;
        self.lock_state().occupancy[i]
    }

    /// What a display should draw at `at`: the occupying train, or the
    /// tile label when free.
    pub fn view(&self, at: Coordinates) -> Option<FieldType> {
        let label = self.get_field(at)?;
        Some(match self.occupant(at) {
            Some(train) => FieldType::TrainPath(train),
            None => label,
        })
    }

    /// Every occupied tile with its occupant, in row-major order.
    pub fn occupied_cells(&self) -> Vec<(Coordinates, TrainId)> {
        let state = self.lock_state();
        state
            .occupancy
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.map(|t| (self.coord(i), t)))
            .collect()
    }

    /// Tiles held by each train on the map.
    pub fn occupancy_snapshot(&self) -> BTreeMap<TrainId, Vec<Coordinates>> {
        let mut snapshot: BTreeMap<TrainId, Vec<Coordinates>> = BTreeMap::new();
        for (at, train) in self.occupied_cells() {
            snapshot.entry(train).or_default().push(at);
        }
        snapshot
    }

    /// Tiles held by `train`, in row-major order.
    pub fn cells_of(&self, train: TrainId) -> Vec<Coordinates> {
        self.occupied_cells()
            .into_iter()
            .filter(|&(_, t)| t == train)
            .map(|(c, _)| c)
            .collect()
    }

    /// Train holding the station entrance at `at`.
    pub fn gate_holder(&self, at: Coordinates) -> Option<TrainId> {
        self.gates.holder(&self.lock_state().book, at)
    }

    /// Whether some train is blocked waiting for the station entrance at
    /// `at`. Diagnostics only.
    pub fn is_thread_waiting(&self, at: Coordinates) -> bool {
        self.gates.is_thread_waiting(&self.lock_state().book, at)
    }

    /// Whether some train is blocked waiting for the plain tile at `at`.
    pub fn is_cell_contended(&self, at: Coordinates) -> bool {
        match self.index(at) {
            Some(i) => self.lock_state().cell_waiting[i] > 0,
            None => false,
        }
    }

    /// Counter bumped on every committed change to occupancy.
    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Block until the generation differs from `seen` or `timeout` passes.
    /// Returns the current generation. Lets a display redraw only on change.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> u64 {
        let state = self.lock_state();
        let (state, _) = self
            .supervisor
            .wait_timeout_while(state, timeout, |s| s.generation == seen)
            .unwrap_or_else(PoisonError::into_inner);
        state.generation
    }

    /// Number of train units currently in service.
    pub fn active_units(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Register a train unit as in service until the returned guard drops.
    /// Painting is refused while any guard is alive.
    pub fn enter_service(&self) -> ServiceGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        ServiceGuard { monitor: self }
    }

    // ============================================================================
    // Painting
    // ============================================================================

    /// Take exclusive access to the tile labels for a batch of edits.
    ///
    /// Painting is a pre-simulation phase: it fails with
    /// [`MonitorError::PaintingWhileActive`] while any train unit is in
    /// service. Movement started during painting waits until the
    /// [`Painter`] is released, so no move ever sees a half-edited map.
    pub fn begin_painting(&self) -> Result<Painter<'_>, MonitorError> {
        let active = self.active_units();
        if active > 0 {
            return Err(MonitorError::PaintingWhileActive { active });
        }
        let guard = self.labels.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Painter { labels: guard })
    }

    /// Release a painter obtained from [`begin_painting`](Self::begin_painting).
    pub fn end_painting(&self, painter: Painter<'_>) {
        drop(painter);
    }

    // ============================================================================
    // Placement
    // ============================================================================

    /// Put a train on the map occupying `cells` (head first).
    ///
    /// All-or-nothing: fails without changes if any tile is unusable or
    /// already occupied, or if the train is already on the map.
    pub fn place_train(&self, train: TrainId, cells: &[Coordinates]) -> Result<(), MonitorError> {
        check_unique(cells)?;
        let mut state = self.lock_state();
        if state.occupancy.contains(&Some(train)) {
            return Err(MonitorError::AlreadyPlaced { train });
        }
        {
            let labels = self.read_labels();
            for &c in cells {
                self.check_traversable(&labels.grid, c)?;
            }
        }
        for &c in cells {
            let i = self.require_index(c)?;
            if let Some(by) = state.occupancy[i] {
                return Err(MonitorError::Occupied { at: c, by });
            }
        }
        self.commit(&mut state, &[], cells, train);
        debug!("{train}: placed on {} tile(s)", cells.len());
        Ok(())
    }

    // ============================================================================
    // Movement
    // ============================================================================

    /// Atomically move `train` from the window `old` to the window `new`.
    ///
    /// - Every tile of `new` must be on the map and traversable, and the
    ///   train must hold every tile of `old`; otherwise a contract
    ///   violation is returned and nothing changes.
    /// - If a tile of `new` that is not in `old` is held by another train,
    ///   the call either waits for it (`wait == true`) or returns
    ///   [`Advance::Blocked`] immediately.
    /// - Station entrances in `new` are claimed through their gate; a
    ///   waiting train sleeps on that gate, not on the tile.
    /// - On success tiles of `old` not in `new` are released (waking their
    ///   waiters) and tiles of `new` are claimed, all under one lock.
    ///
    /// A train interrupted with [`interrupt`](Self::interrupt) while
    /// waiting gets [`MonitorError::Interrupted`] with its old window
    /// intact.
    pub fn move_to_next_station(
        &self,
        old: &[Coordinates],
        new: &[Coordinates],
        train: TrainId,
        wait: bool,
    ) -> Result<Advance, MonitorError> {
        check_unique(old)?;
        check_unique(new)?;

        // Gates taken while waiting but not yet committed
        let mut provisional: Vec<Coordinates> = Vec::new();
        let mut state = self.lock_state();

        loop {
            if state.interrupted.contains(&train) {
                self.drop_provisional(&mut state, &mut provisional);
                return Err(MonitorError::Interrupted { train });
            }

            let blocker = {
                let labels = self.read_labels();
                match self.check_move(&state, &labels.grid, old, new, train) {
                    Ok(blocker) => blocker,
                    Err(e) => {
                        drop(labels);
                        self.drop_provisional(&mut state, &mut provisional);
                        return Err(e);
                    }
                }
            };

            match blocker {
                None => {
                    self.commit(&mut state, old, new, train);
                    debug!("{train}: advanced to {}", describe_head(new));
                    return Ok(Advance::Moved);
                }
                Some(Blocker::Cell(at)) | Some(Blocker::Gate(at)) if !wait => {
                    self.drop_provisional(&mut state, &mut provisional);
                    return Ok(Advance::Blocked { at });
                }
                Some(Blocker::Cell(at)) => {
                    self.drop_provisional(&mut state, &mut provisional);
                    state = self.wait_for_cell(state, at, train);
                }
                Some(Blocker::Gate(at)) => {
                    let result = self.gates.lock_destination(
                        state,
                        at,
                        train,
                        &self.supervisor,
                        |s: &MapState| s.interrupted.contains(&train),
                    );
                    match result {
                        Ok(guard) => {
                            trace!("{train}: holds gate {at}, re-checking window");
                            state = guard;
                            provisional.push(at);
                        }
                        Err(e) => {
                            let mut state = self.lock_state();
                            self.drop_provisional(&mut state, &mut provisional);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make every current and future wait of `train` return
    /// [`MonitorError::Interrupted`] until the train is released.
    pub fn interrupt(&self, train: TrainId) {
        let mut state = self.lock_state();
        state.interrupted.insert(train);
        self.wake_all();
        debug!("{train}: interrupted");
    }

    /// Whether `train` has a pending interrupt.
    pub fn is_interrupted(&self, train: TrainId) -> bool {
        self.lock_state().interrupted.contains(&train)
    }

    /// Remove `train` from the map: free every tile and gate it holds,
    /// wake their waiters and clear its interrupt. Returns the number of
    /// tiles freed.
    pub fn release_train(&self, train: TrainId) -> usize {
        let mut state = self.lock_state();
        let held: Vec<Coordinates> = state
            .occupancy
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == Some(train))
            .map(|(i, _)| self.coord(i))
            .collect();
        self.commit(&mut state, &held, &[], train);
        self.gates.release_all(&mut state.book, train);
        state.interrupted.remove(&train);
        if !held.is_empty() {
            debug!("{train}: released {} tile(s)", held.len());
        }
        held.len()
    }

    // ============================================================================
    // Rendering
    // ============================================================================

    /// Text rendering of the map: occupied tiles show the train digit,
    /// free tiles their label symbol. One line per row.
    pub fn render_ascii(&self) -> String {
        let state = self.lock_state();
        let labels = self.read_labels();
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in 0..self.height {
            for (col, label) in labels.grid.row(row).iter().enumerate() {
                let i = row * self.width + col;
                let symbol = match state.occupancy[i] {
                    Some(train) => FieldType::TrainPath(train).symbol(),
                    None => label.symbol(),
                };
                out.push(symbol);
            }
            out.push('\n');
        }
        out
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn lock_state(&self) -> MutexGuard<'_, MapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_labels(&self) -> RwLockReadGuard<'_, Labels> {
        self.labels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn index(&self, at: Coordinates) -> Option<usize> {
        self.contains(at).then(|| at.row * self.width + at.col)
    }

    fn require_index(&self, at: Coordinates) -> Result<usize, MonitorError> {
        self.index(at).ok_or(MonitorError::OutOfBounds { at })
    }

    fn coord(&self, i: usize) -> Coordinates {
        Coordinates::new(i / self.width, i % self.width)
    }

    fn check_traversable(&self, grid: &TunnelsGrid, at: Coordinates) -> Result<(), MonitorError> {
        match grid.get(at) {
            None => Err(MonitorError::OutOfBounds { at }),
            Some(FieldType::Wall) => Err(MonitorError::WallCell { at }),
            Some(FieldType::Station) => Err(MonitorError::StationCell { at }),
            Some(_) => Ok(()),
        }
    }

    /// Validate the move and find the first tile that stops it.
    fn check_move(
        &self,
        state: &MapState,
        grid: &TunnelsGrid,
        old: &[Coordinates],
        new: &[Coordinates],
        train: TrainId,
    ) -> Result<Option<Blocker>, MonitorError> {
        if old.is_empty() || new.is_empty() {
            return Err(MonitorError::MalformedWindow);
        }
        for &c in new {
            self.check_traversable(grid, c)?;
        }
        for &c in old {
            let i = self.require_index(c)?;
            if state.occupancy[i] != Some(train) {
                return Err(MonitorError::NotOwner { train, at: c });
            }
        }

        for &c in new.iter().filter(|c| !old.contains(c)) {
            let i = self.require_index(c)?;
            match state.occupancy[i] {
                Some(other) if other != train => {
                    return Ok(Some(if self.gates.is_entrance(c) {
                        Blocker::Gate(c)
                    } else {
                        Blocker::Cell(c)
                    }));
                }
                _ => {}
            }
            if let Some(holder) = self.gates.holder(&state.book, c) {
                if holder != train {
                    return Ok(Some(Blocker::Gate(c)));
                }
            }
        }
        Ok(None)
    }

    /// Release `old \ new`, claim `new \ old`, keep gates in step with
    /// occupancy and wake whoever waits on a freed tile.
    fn commit(&self, state: &mut MapState, old: &[Coordinates], new: &[Coordinates], train: TrainId) {
        for &c in old.iter().filter(|c| !new.contains(c)) {
            let Some(i) = self.index(c) else { continue };
            state.occupancy[i] = None;
            self.cell_signals[i].notify_all();
            if self.gates.holder(&state.book, c) == Some(train) {
                // Only fails for non-entrances, which have no holder
                let _ = self.gates.signal_starting_point(&mut state.book, c);
                debug!("{train}: left station entrance {c}");
            }
        }
        for &c in new.iter().filter(|c| !old.contains(c)) {
            let Some(i) = self.index(c) else { continue };
            state.occupancy[i] = Some(train);
            if self.gates.is_entrance(c) {
                let _ = self.gates.try_lock_destination(&mut state.book, c, train);
                debug!("{train}: entered station entrance {c}");
            }
        }
        state.generation += 1;
        self.supervisor.notify_all();
    }

    fn wait_for_cell<'a>(
        &'a self,
        mut state: MutexGuard<'a, MapState>,
        at: Coordinates,
        train: TrainId,
    ) -> MutexGuard<'a, MapState> {
        let Some(i) = self.index(at) else { return state };
        trace!("{train}: waiting for tile {at}");
        state.cell_waiting[i] += 1;
        let mut state = self.cell_signals[i]
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
        state.cell_waiting[i] -= 1;
        state
    }

    fn drop_provisional(&self, state: &mut MapState, provisional: &mut Vec<Coordinates>) {
        for c in provisional.drain(..) {
            let _ = self.gates.signal_starting_point(&mut state.book, c);
        }
    }

    /// Wake every waiter on every tile and gate. Caller holds `state`.
    fn wake_all(&self) {
        for c in &self.cell_signals {
            c.notify_all();
        }
        self.gates.wake_all();
        self.supervisor.notify_all();
    }
}

/// Keeps a train unit counted as in service; see
/// [`TrackMonitor::enter_service`].
#[derive(Debug)]
pub struct ServiceGuard<'a> {
    monitor: &'a TrackMonitor,
}

impl Drop for ServiceGuard<'_> {
    fn drop(&mut self) {
        self.monitor.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Exclusive access to the tile labels during the painting phase.
///
/// Dropping the painter (or passing it to
/// [`TrackMonitor::end_painting`]) ends the phase.
///
/// Station tiles are fixed when the monitor is built: painting a station
/// or over a station is refused.
#[derive(Debug)]
pub struct Painter<'a> {
    labels: RwLockWriteGuard<'a, Labels>,
}

impl Painter<'_> {
    /// Current label of a tile.
    pub fn get_field(&self, at: Coordinates) -> Option<FieldType> {
        self.labels.grid.get(at)
    }

    /// Overwrite a tile label. Returns the previous label.
    pub fn set_field(&mut self, at: Coordinates, label: FieldType) -> Result<FieldType, MonitorError> {
        match self.labels.grid.get(at) {
            None => return Err(MonitorError::OutOfBounds { at }),
            Some(FieldType::Station) => return Err(MonitorError::StationCell { at }),
            Some(_) if label == FieldType::Station => {
                return Err(MonitorError::StationCell { at })
            }
            Some(_) => {}
        }
        self.labels
            .grid
            .set(at, label)
            .ok_or(MonitorError::OutOfBounds { at })
    }

    /// Record that `train`'s course enters the tile at `at` and paint it
    /// with the train's path label.
    pub fn begin_course(&mut self, at: Coordinates, train: TrainId) -> Result<(), MonitorError> {
        match self.labels.grid.get(at) {
            None => return Err(MonitorError::OutOfBounds { at }),
            Some(FieldType::Wall) => return Err(MonitorError::WallCell { at }),
            Some(FieldType::Station) => return Err(MonitorError::StationCell { at }),
            Some(_) => {}
        }
        let courses = self.labels.courses.entry(at).or_default();
        courses.retain(|&t| t != train);
        courses.push(train);
        self.labels.grid.set(at, FieldType::TrainPath(train));
        Ok(())
    }

    /// Remove `train`'s course from `at`. The tile falls back to the most
    /// recent remaining course, or to empty tunnel. Returns whether the
    /// train had a course there.
    pub fn end_course(&mut self, at: Coordinates, train: TrainId) -> Result<bool, MonitorError> {
        if !self.labels.grid.contains(at) {
            return Err(MonitorError::OutOfBounds { at });
        }
        let Some(courses) = self.labels.courses.get_mut(&at) else {
            return Ok(false);
        };
        let before = courses.len();
        courses.retain(|&t| t != train);
        if courses.len() == before {
            return Ok(false);
        }
        let fallback = courses
            .last()
            .map_or(FieldType::Empty, |&t| FieldType::TrainPath(t));
        if courses.is_empty() {
            self.labels.courses.remove(&at);
        }
        if matches!(self.labels.grid.get(at), Some(FieldType::TrainPath(_))) {
            self.labels.grid.set(at, fallback);
        }
        Ok(true)
    }

    /// Begin a course for `train` on every tile of `route`. Validates the
    /// whole route first, so a failure paints nothing.
    pub fn paint_route(&mut self, route: &[Coordinates], train: TrainId) -> Result<(), MonitorError> {
        for &at in route {
            match self.labels.grid.get(at) {
                None => return Err(MonitorError::OutOfBounds { at }),
                Some(FieldType::Wall) => return Err(MonitorError::WallCell { at }),
                Some(FieldType::Station) => return Err(MonitorError::StationCell { at }),
                Some(_) => {}
            }
        }
        for &at in route {
            self.begin_course(at, train)?;
        }
        Ok(())
    }

    /// End `train`'s course on every tile of `route`.
    pub fn erase_route(&mut self, route: &[Coordinates], train: TrainId) -> Result<(), MonitorError> {
        for &at in route {
            self.end_course(at, train)?;
        }
        Ok(())
    }
}

fn check_unique(window: &[Coordinates]) -> Result<(), MonitorError> {
    if window.is_empty() {
        return Err(MonitorError::MalformedWindow);
    }
    for (i, c) in window.iter().enumerate() {
        if window[i + 1..].contains(c) {
            return Err(MonitorError::MalformedWindow);
        }
    }
    Ok(())
}

fn describe_head(window: &[Coordinates]) -> String {
    window.first().map(|c| c.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn c(row: usize, col: usize) -> Coordinates {
        Coordinates::new(row, col)
    }

    fn line(len: usize) -> TrackMonitor {
        let row = ".".repeat(len);
        TrackMonitor::new(TunnelsGrid::from_rows(&[row.as_str()]).unwrap())
    }

    fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        f()
    }

    #[test]
    fn placement_is_all_or_nothing() {
        let m = line(5);
        m.place_train(TrainId(1), &[c(0, 2)]).unwrap();
        let err = m.place_train(TrainId(2), &[c(0, 3), c(0, 2)]).unwrap_err();
        assert_eq!(
            err,
            MonitorError::Occupied {
                at: c(0, 2),
                by: TrainId(1)
            }
        );
        assert_eq!(m.occupant(c(0, 3)), None);
        assert_eq!(
            m.place_train(TrainId(1), &[c(0, 0)]),
            Err(MonitorError::AlreadyPlaced { train: TrainId(1) })
        );
    }

    #[test]
    fn wall_move_is_rejected_without_change() {
        let m = TrackMonitor::new(TunnelsGrid::from_rows(&["..#"]).unwrap());
        m.place_train(TrainId(1), &[c(0, 1), c(0, 0)]).unwrap();
        let err = m
            .move_to_next_station(&[c(0, 1), c(0, 0)], &[c(0, 2), c(0, 1)], TrainId(1), true)
            .unwrap_err();
        assert_eq!(err, MonitorError::WallCell { at: c(0, 2) });
        assert!(err.is_contract_violation());
        assert_eq!(m.cells_of(TrainId(1)), vec![c(0, 0), c(0, 1)]);
    }

    #[test]
    fn move_requires_ownership_of_old_window() {
        let m = line(4);
        m.place_train(TrainId(1), &[c(0, 0)]).unwrap();
        let err = m
            .move_to_next_station(&[c(0, 1)], &[c(0, 2)], TrainId(1), true)
            .unwrap_err();
        assert_eq!(
            err,
            MonitorError::NotOwner {
                train: TrainId(1),
                at: c(0, 1)
            }
        );
    }

    #[test]
    fn malformed_windows_rejected() {
        let m = line(4);
        m.place_train(TrainId(1), &[c(0, 0)]).unwrap();
        assert_eq!(
            m.move_to_next_station(&[c(0, 0)], &[], TrainId(1), false),
            Err(MonitorError::MalformedWindow)
        );
        assert_eq!(
            m.move_to_next_station(&[c(0, 0)], &[c(0, 1), c(0, 1)], TrainId(1), false),
            Err(MonitorError::MalformedWindow)
        );
    }

    #[test]
    fn out_of_bounds_move_rejected() {
        let m = line(2);
        m.place_train(TrainId(1), &[c(0, 1)]).unwrap();
        assert_eq!(
            m.move_to_next_station(&[c(0, 1)], &[c(0, 2)], TrainId(1), false),
            Err(MonitorError::OutOfBounds { at: c(0, 2) })
        );
    }

    #[test]
    fn blocked_move_wakes_when_tile_frees() {
        let m = Arc::new(line(4));
        m.place_train(TrainId(1), &[c(0, 1), c(0, 0)]).unwrap();
        m.place_train(TrainId(2), &[c(0, 2)]).unwrap();

        let waiter = {
            let m = m.clone();
            thread::spawn(move || {
                m.move_to_next_station(&[c(0, 1), c(0, 0)], &[c(0, 2), c(0, 1)], TrainId(1), true)
            })
        };

        assert!(wait_until(Duration::from_secs(5), || m.is_cell_contended(c(0, 2))));
        m.move_to_next_station(&[c(0, 2)], &[c(0, 3)], TrainId(2), true)
            .unwrap();

        assert_eq!(waiter.join().unwrap(), Ok(Advance::Moved));
        assert_eq!(m.occupant(c(0, 2)), Some(TrainId(1)));
        assert_eq!(m.occupant(c(0, 0)), None);
        assert_eq!(m.occupant(c(0, 3)), Some(TrainId(2)));
    }

    #[test]
    fn interrupt_cancels_a_wait_and_keeps_window() {
        let m = Arc::new(line(3));
        m.place_train(TrainId(1), &[c(0, 0)]).unwrap();
        m.place_train(TrainId(2), &[c(0, 1)]).unwrap();

        let waiter = {
            let m = m.clone();
            thread::spawn(move || m.move_to_next_station(&[c(0, 0)], &[c(0, 1)], TrainId(1), true))
        };
        assert!(wait_until(Duration::from_secs(5), || m.is_cell_contended(c(0, 1))));
        m.interrupt(TrainId(1));

        assert_eq!(
            waiter.join().unwrap(),
            Err(MonitorError::Interrupted { train: TrainId(1) })
        );
        assert_eq!(m.occupant(c(0, 0)), Some(TrainId(1)));
        assert!(m.is_interrupted(TrainId(1)));

        assert_eq!(m.release_train(TrainId(1)), 1);
        assert!(!m.is_interrupted(TrainId(1)));
        assert_eq!(m.occupied_cells(), vec![(c(0, 1), TrainId(2))]);
    }

    #[test]
    fn station_entrance_is_claimed_through_gate() {
        // Station at (0,0); entrances (0,1) and (1,0) ... (1,1)
        let grid = TunnelsGrid::from_rows(&["S..", "...", "..."]).unwrap();
        let m = Arc::new(TrackMonitor::new(grid));
        let entrance = c(0, 1);
        assert!(m.stations_entrances().contains(&entrance));

        m.place_train(TrainId(1), &[entrance]).unwrap();
        assert_eq!(m.gate_holder(entrance), Some(TrainId(1)));
        m.place_train(TrainId(2), &[c(0, 2)]).unwrap();

        let waiter = {
            let m = m.clone();
            thread::spawn(move || m.move_to_next_station(&[c(0, 2)], &[entrance], TrainId(2), true))
        };
        assert!(wait_until(Duration::from_secs(5), || m.is_thread_waiting(entrance)));

        m.move_to_next_station(&[entrance], &[c(1, 1)], TrainId(1), true)
            .unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(Advance::Moved));
        assert_eq!(m.gate_holder(entrance), Some(TrainId(2)));
        assert!(!m.is_thread_waiting(entrance));
    }

    #[test]
    fn non_blocking_move_reports_gate() {
        let grid = TunnelsGrid::from_rows(&["S.."]).unwrap();
        let m = TrackMonitor::new(grid);
        m.place_train(TrainId(1), &[c(0, 1)]).unwrap();
        m.place_train(TrainId(2), &[c(0, 2)]).unwrap();
        assert_eq!(
            m.move_to_next_station(&[c(0, 2)], &[c(0, 1)], TrainId(2), false),
            Ok(Advance::Blocked { at: c(0, 1) })
        );
        assert_eq!(m.gate_holder(c(0, 1)), Some(TrainId(1)));
    }

    #[test]
    fn release_frees_tiles_and_gates() {
        let grid = TunnelsGrid::from_rows(&["S..."]).unwrap();
        let m = TrackMonitor::new(grid);
        m.place_train(TrainId(1), &[c(0, 2), c(0, 1)]).unwrap();
        assert_eq!(m.release_train(TrainId(1)), 2);
        assert!(m.occupied_cells().is_empty());
        assert_eq!(m.gate_holder(c(0, 1)), None);
    }

    #[test]
    fn painting_refused_while_in_service() {
        let m = line(3);
        {
            let _service = m.enter_service();
            assert_eq!(
                m.begin_painting().unwrap_err(),
                MonitorError::PaintingWhileActive { active: 1 }
            );
        }
        let mut painter = m.begin_painting().unwrap();
        painter.set_field(c(0, 2), FieldType::Wall).unwrap();
        m.end_painting(painter);
        assert_eq!(m.get_field(c(0, 2)), Some(FieldType::Wall));
    }

    #[test]
    fn painter_keeps_stations_fixed() {
        let m = TrackMonitor::new(TunnelsGrid::from_rows(&["S.."]).unwrap());
        let mut painter = m.begin_painting().unwrap();
        assert!(painter.set_field(c(0, 0), FieldType::Empty).is_err());
        assert!(painter.set_field(c(0, 2), FieldType::Station).is_err());
    }

    #[test]
    fn courses_stack_and_unwind() {
        let m = line(3);
        let at = c(0, 1);
        {
            let mut painter = m.begin_painting().unwrap();
            painter.begin_course(at, TrainId(1)).unwrap();
            painter.begin_course(at, TrainId(2)).unwrap();
            assert_eq!(painter.get_field(at), Some(FieldType::TrainPath(TrainId(2))));

            assert!(painter.end_course(at, TrainId(2)).unwrap());
            assert_eq!(painter.get_field(at), Some(FieldType::TrainPath(TrainId(1))));
            assert!(!painter.end_course(at, TrainId(2)).unwrap());
        }
        assert_eq!(m.courses_through(at), vec![TrainId(1)]);

        let mut painter = m.begin_painting().unwrap();
        painter.end_course(at, TrainId(1)).unwrap();
        drop(painter);
        assert_eq!(m.get_field(at), Some(FieldType::Empty));
        assert!(m.courses_through(at).is_empty());
    }

    #[test]
    fn paint_route_validates_first() {
        let m = TrackMonitor::new(TunnelsGrid::from_rows(&["..#"]).unwrap());
        let mut painter = m.begin_painting().unwrap();
        let err = painter
            .paint_route(&[c(0, 0), c(0, 1), c(0, 2)], TrainId(1))
            .unwrap_err();
        assert_eq!(err, MonitorError::WallCell { at: c(0, 2) });
        assert_eq!(painter.get_field(c(0, 0)), Some(FieldType::Empty));
    }

    #[test]
    fn erased_route_restores_the_grid() {
        let m = line(4);
        let before = m.grid_snapshot();
        let route = [c(0, 0), c(0, 1), c(0, 2)];

        let mut painter = m.begin_painting().unwrap();
        painter.paint_route(&route, TrainId(5)).unwrap();
        painter.paint_route(&route[1..], TrainId(6)).unwrap();
        m.end_painting(painter);

        let painted = m.grid_snapshot();
        assert_eq!(painted.get(c(0, 0)), Some(FieldType::TrainPath(TrainId(5))));
        assert_eq!(painted.get(c(0, 1)), Some(FieldType::TrainPath(TrainId(6))));
        assert_eq!(painted.get(c(0, 3)), Some(FieldType::Empty));

        let mut painter = m.begin_painting().unwrap();
        painter.erase_route(&route[1..], TrainId(6)).unwrap();
        assert_eq!(painter.get_field(c(0, 1)), Some(FieldType::TrainPath(TrainId(5))));
        painter.erase_route(&route, TrainId(5)).unwrap();
        m.end_painting(painter);

        assert_eq!(m.grid_snapshot(), before);
        assert!(m.courses_through(c(0, 1)).is_empty());
    }

    #[test]
    fn render_and_generation_track_moves() {
        let m = line(3);
        let g0 = m.generation();
        m.place_train(TrainId(7), &[c(0, 0)]).unwrap();
        assert!(m.generation() > g0);
        assert_eq!(m.render_ascii(), "7..\n");
        assert_eq!(m.view(c(0, 0)), Some(FieldType::TrainPath(TrainId(7))));
        assert_eq!(m.view(c(0, 1)), Some(FieldType::Empty));

        let snapshot = m.occupancy_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&TrainId(7)], vec![c(0, 0)]);

        let seen = m.generation();
        assert_eq!(m.wait_for_change(seen, Duration::from_millis(10)), seen);
    }
}
