//! Station entrance gates.
//!
//! Each station entrance can be held by at most one train. A train that
//! wants an entrance held by another waits on that entrance's own
//! condition variable, so only trains heading for the same entrance are
//! woken when it frees up.
//!
//! # Shared lock
//!
//! The gates do not own a mutex. Their mutable state ([`GateBook`]) lives
//! inside whatever state the caller's mutex guards (the
//! [`TrackMonitor`](crate::TrackMonitor) keeps it next to occupancy), and
//! every blocking call takes and returns that caller's `MutexGuard`. The
//! check "entrance is free" and the claim happen under the same lock the
//! monitor commits moves with, so there is no window in which a wakeup
//! can be lost between "station freed" and "train resumes".
//!
//! ```rust
//! use std::sync::{Condvar, Mutex};
//! use rs_metro::{Coordinates, GateBook, StationGates, TrainId};
//!
//! let entrance = Coordinates::new(0, 1);
//! let gates = StationGates::new(&[entrance]);
//! let book = Mutex::new(gates.book());
//! let supervisor = Condvar::new();
//!
//! let guard = book.lock().unwrap();
//! let mut guard = gates
//!     .lock_destination(guard, entrance, TrainId(1), &supervisor, |_| false)
//!     .unwrap();
//! assert_eq!(gates.holder(&guard, entrance), Some(TrainId(1)));
//!
//! gates.signal_starting_point(&mut guard, entrance).unwrap();
//! assert_eq!(gates.holder(&guard, entrance), None);
//! ```

use std::borrow::BorrowMut;
use std::sync::{Condvar, MutexGuard, PoisonError};

use log::trace;

use crate::coordinates::Coordinates;
use crate::error::MonitorError;
use crate::field::TrainId;

/// Mutable gate state: who holds each entrance and how many trains wait.
///
/// Indexed in the same order as the owning [`StationGates`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateBook {
    holders: Vec<Option<TrainId>>,
    waiting: Vec<usize>,
}

impl GateBook {
    /// Entrances held by `train`.
    pub fn held_by(&self, train: TrainId) -> impl Iterator<Item = usize> + '_ {
        self.holders
            .iter()
            .enumerate()
            .filter(move |(_, h)| **h == Some(train))
            .map(|(i, _)| i)
    }

    /// Number of entrances currently held by any train.
    pub fn held_count(&self) -> usize {
        self.holders.iter().filter(|h| h.is_some()).count()
    }
}

/// One condition variable per station entrance.
#[derive(Debug, Default)]
pub struct StationGates {
    entrances: Vec<Coordinates>,
    conditions: Vec<Condvar>,
}

impl StationGates {
    /// Create gates for the given entrances. Duplicates share one gate.
    pub fn new(entrances: &[Coordinates]) -> Self {
        let mut unique: Vec<Coordinates> = Vec::with_capacity(entrances.len());
        for &c in entrances {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        let conditions = unique.iter().map(|_| Condvar::new()).collect();
        Self {
            entrances: unique,
            conditions,
        }
    }

    /// A fresh book with every entrance free, sized for these gates.
    pub fn book(&self) -> GateBook {
        GateBook {
            holders: vec![None; self.entrances.len()],
            waiting: vec![0; self.entrances.len()],
        }
    }

    /// Entrances guarded by these gates.
    pub fn entrances(&self) -> &[Coordinates] {
        &self.entrances
    }

    /// Whether `at` is a guarded entrance.
    pub fn is_entrance(&self, at: Coordinates) -> bool {
        self.index_of(at).is_some()
    }

    fn index_of(&self, at: Coordinates) -> Option<usize> {
        self.entrances.iter().position(|&c| c == at)
    }

    fn require(&self, at: Coordinates) -> Result<usize, MonitorError> {
        self.index_of(at).ok_or(MonitorError::UnknownEntrance { at })
    }

    /// Block until the entrance at `destination` is free, then hold it
    /// for `train`.
    ///
    /// Returns immediately if `train` already holds it. While waiting the
    /// caller's lock is released. Each time the train has to wait,
    /// `supervisor` is notified so observers can see a train is stalled
    /// at a station.
    ///
    /// `cancelled` is evaluated under the lock before every wait; when it
    /// returns `true` the call gives up with
    /// [`MonitorError::Interrupted`] and the gate is left untouched.
    pub fn lock_destination<'a, S, F>(
        &self,
        mut guard: MutexGuard<'a, S>,
        destination: Coordinates,
        train: TrainId,
        supervisor: &Condvar,
        cancelled: F,
    ) -> Result<MutexGuard<'a, S>, MonitorError>
    where
        S: BorrowMut<GateBook>,
        F: Fn(&S) -> bool,
    {
        let i = self.require(destination)?;
        loop {
            {
                let book: &mut GateBook = (*guard).borrow_mut();
                match book.holders[i] {
                    None => {
                        book.holders[i] = Some(train);
                        return Ok(guard);
                    }
                    Some(holder) if holder == train => return Ok(guard),
                    Some(_) => {}
                }
            }

            if cancelled(&*guard) {
                self.pass_on_if_free(&mut guard, i);
                return Err(MonitorError::Interrupted { train });
            }

            trace!("{train}: entrance {destination} is taken, waiting");
            let book: &mut GateBook = (*guard).borrow_mut();
            book.waiting[i] += 1;
            supervisor.notify_all();
            guard = self.conditions[i]
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
            let book: &mut GateBook = (*guard).borrow_mut();
            book.waiting[i] -= 1;
        }
    }

    /// Hold the entrance for `train` if it is free (or already held by
    /// `train`). Never blocks.
    pub fn try_lock_destination(
        &self,
        book: &mut GateBook,
        destination: Coordinates,
        train: TrainId,
    ) -> Result<bool, MonitorError> {
        let i = self.require(destination)?;
        match book.holders[i] {
            None => {
                book.holders[i] = Some(train);
                Ok(true)
            }
            Some(holder) => Ok(holder == train),
        }
    }

    /// Mark the entrance at `start` free and wake one waiting train, which
    /// then re-checks the gate itself.
    pub fn signal_starting_point(
        &self,
        book: &mut GateBook,
        start: Coordinates,
    ) -> Result<(), MonitorError> {
        let i = self.require(start)?;
        book.holders[i] = None;
        self.conditions[i].notify_one();
        Ok(())
    }

    /// Free every entrance `train` holds, waking one waiter per entrance.
    pub fn release_all(&self, book: &mut GateBook, train: TrainId) -> usize {
        let held: Vec<usize> = book.held_by(train).collect();
        for &i in &held {
            book.holders[i] = None;
            self.conditions[i].notify_one();
        }
        held.len()
    }

    /// Train currently holding the entrance at `at`.
    pub fn holder(&self, book: &GateBook, at: Coordinates) -> Option<TrainId> {
        let i = self.index_of(at)?;
        book.holders[i]
    }

    /// Whether at least one train is blocked waiting for the entrance at
    /// `at`. For diagnostics only.
    pub fn is_thread_waiting(&self, book: &GateBook, at: Coordinates) -> bool {
        self.index_of(at).is_some_and(|i| book.waiting[i] > 0)
    }

    /// Wake every waiter on every gate so each re-evaluates its condition.
    /// Used for cancellation; the caller must hold the shared lock.
    pub fn wake_all(&self) {
        for c in &self.conditions {
            c.notify_all();
        }
    }

    /// A cancelled waiter may have consumed the single wakeup meant for a
    /// free gate; hand it to the next waiter.
    fn pass_on_if_free<S: BorrowMut<GateBook>>(&self, guard: &mut MutexGuard<'_, S>, i: usize) {
        let book: &mut GateBook = (**guard).borrow_mut();
        if book.holders[i].is_none() && book.waiting[i] > 0 {
            self.conditions[i].notify_one();
        }
    }
}
