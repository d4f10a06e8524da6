// src/robot/status.rs

//! Robot status model and its single-writer store.
//!
//! [`StatusStore`] is the only owner of [`RobotStatus`]. Everyone else gets
//! snapshot copies (`snapshot`) or change notifications (`subscribe`).
//! Mutation is crate-private: only the sequential executor and the inbound
//! device handler write to it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::command::{Motor, MotorDirection, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub power: i32,
    pub direction: MotorDirection,
}

impl MotorState {
    pub const STOPPED: MotorState = MotorState {
        power: 0,
        direction: MotorDirection::Stop,
    };

    /// State for a signed power level: the sign picks the direction, the
    /// stored power is the magnitude.
    pub fn from_signed_power(power: i32) -> Self {
        let power = power.clamp(-100, 100);
        let direction = match power {
            p if p > 0 => MotorDirection::Forward,
            p if p < 0 => MotorDirection::Backward,
            _ => MotorDirection::Stop,
        };
        Self {
            power: power.abs(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Motors {
    pub left: MotorState,
    pub right: MotorState,
}

impl Motors {
    pub fn get(&self, motor: Motor) -> MotorState {
        match motor {
            Motor::Left => self.left,
            Motor::Right => self.right,
        }
    }

    pub fn set(&mut self, motor: Motor, state: MotorState) {
        match motor {
            Motor::Left => self.left = state,
            Motor::Right => self.right = state,
        }
    }

    pub fn stop_all(&mut self) {
        self.left = MotorState::STOPPED;
        self.right = MotorState::STOPPED;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotStatus {
    pub connected: bool,
    pub running: bool,
    pub position: Position,
    pub sensors: BTreeMap<String, f64>,
    pub motors: Motors,
    /// Servo id → angle in degrees.
    pub servos: BTreeMap<u8, f64>,
    /// Milliseconds since the UNIX epoch of the last mutation.
    pub last_update: u64,
    pub error: Option<String>,
}

/// Status report pushed by a device over the channel.
///
/// Present fields replace the corresponding status fields wholesale;
/// `connected`/`running` are owned locally and never reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub sensors: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub motors: Option<Motors>,
    #[serde(default)]
    pub servos: Option<BTreeMap<u8, f64>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeviceReport {
    fn merge_into(self, status: &mut RobotStatus) {
        if let Some(position) = self.position {
            status.position = position;
        }
        if let Some(sensors) = self.sensors {
            status.sensors = sensors;
        }
        if let Some(motors) = self.motors {
            status.motors = motors;
        }
        if let Some(servos) = self.servos {
            status.servos = servos;
        }
        if self.error.is_some() {
            status.error = self.error;
        }
    }
}

/// Handle returned by [`StatusStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&RobotStatus) + Send + Sync>;

/// Owner of the robot status.
///
/// Listeners run synchronously on the publishing thread, in subscription
/// order, with the post-mutation snapshot. They may query the executor but
/// must not block or change the status themselves.
///
/// A change is committed and published in two steps so callers can mutate
/// under their own lock and notify after releasing it. Snapshots reach
/// listeners in commit order; one superseded before it was published is
/// skipped.
pub struct StatusStore {
    status: Mutex<RobotStatus>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    committed: AtomicU64,
    // Sequence number of the last snapshot handed to listeners.
    published: Mutex<u64>,
    next_listener: AtomicU64,
}

/// A committed status change not yet announced to listeners.
#[must_use = "a committed change must be published"]
#[derive(Debug)]
pub(crate) struct StatusChange {
    seq: u64,
    snapshot: RobotStatus,
}

impl fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStore")
            .field("status", &*lock(&self.status))
            .field("listeners", &lock(&self.listeners).len())
            .finish_non_exhaustive()
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(RobotStatus::default()),
            listeners: Mutex::new(Vec::new()),
            committed: AtomicU64::new(0),
            published: Mutex::new(0),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> RobotStatus {
        lock(&self.status).clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RobotStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        lock(&self.listeners).push((id, listener));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Apply `change`, stamp `last_update`, and notify listeners.
    pub(crate) fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut RobotStatus),
    {
        let change = self.commit(change);
        self.publish(change);
    }

    /// Apply `change` and stamp `last_update` without notifying anyone.
    pub(crate) fn commit<F>(&self, change: F) -> StatusChange
    where
        F: FnOnce(&mut RobotStatus),
    {
        let mut status = lock(&self.status);
        change(&mut status);
        status.last_update = now_millis();
        let seq = self.committed.fetch_add(1, Ordering::Relaxed) + 1;
        StatusChange {
            seq,
            snapshot: status.clone(),
        }
    }

    /// Hand a committed snapshot to every listener.
    pub(crate) fn publish(&self, change: StatusChange) {
        let mut published = lock(&self.published);
        if change.seq <= *published {
            trace!(seq = change.seq, "skipping superseded status snapshot");
            return;
        }
        *published = change.seq;

        // Clone the list so listeners may (un)subscribe without deadlocking.
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        trace!(listeners = listeners.len(), "notifying status listeners");
        for listener in listeners {
            listener(&change.snapshot);
        }
    }

    pub(crate) fn apply_report(&self, report: DeviceReport) {
        self.update(|status| report.merge_into(status));
    }

    /// Back to the disconnected defaults.
    pub(crate) fn reset(&self) {
        self.update(|status| *status = RobotStatus::default());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
