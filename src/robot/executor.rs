// src/robot/executor.rs

//! Sequential command executor.
//!
//! State machine: `Idle → Running → Idle`. While running, commands are taken
//! from the front of the queue one at a time; a command (including any
//! delay it implies) completes before the next one starts.
//!
//! - `start` is rejected while running (the in-flight queue is left alone)
//!   and when no connected device channel is attached. Connection is only
//!   checked there: if the channel drops mid-run, commands keep applying to
//!   the local status model.
//! - `stop` clears the pending queue, returns to idle, cancels an in-flight
//!   `wait`/`move` delay immediately, and issues an explicit stop-motors.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::{DeviceChannel, DeviceMessage};
use super::command::{Motor, MoveDirection, RobotCommand};
use super::error::ExecutorError;
use super::status::{MotorState, StatusStore};

/// Left/right motor states for a `move` at `power`.
///
/// Forward and backward drive both wheels; turning holds the inner wheel at
/// zero and drives the outer one forward.
pub fn move_motor_states(direction: MoveDirection, power: i32) -> (MotorState, MotorState) {
    let drive = MotorState::from_signed_power(power);
    let reverse = MotorState::from_signed_power(-power);
    match direction {
        MoveDirection::Forward => (drive, drive),
        MoveDirection::Backward => (reverse, reverse),
        MoveDirection::Left => (MotorState::STOPPED, drive),
        MoveDirection::Right => (drive, MotorState::STOPPED),
    }
}

/// Summary of one drained program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Commands applied.
    pub executed: usize,
    /// Unknown commands skipped.
    pub skipped: usize,
    /// Whether `stop()` (or a disconnect) ended the run early.
    pub stopped: bool,
}

/// Handle on a program started with [`SequentialExecutor::start`].
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<RunReport>,
}

impl RunHandle {
    pub async fn wait(self) -> RunReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "command drain task did not complete");
                RunReport {
                    stopped: true,
                    ..RunReport::default()
                }
            }
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    /// Bumped on every start; a drain task only acts while its generation
    /// is current.
    generation: u64,
    queue: VecDeque<RobotCommand>,
    stop_tx: Option<watch::Sender<bool>>,
}

enum Step {
    Done,
    Skipped,
    Interrupted,
}

pub struct SequentialExecutor {
    status: Arc<StatusStore>,
    channel: Mutex<Option<Arc<dyn DeviceChannel>>>,
    state: Mutex<RunState>,
    move_power: i32,
}

impl fmt::Debug for SequentialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SequentialExecutor")
            .field("running", &state.running)
            .field("pending", &state.queue.len())
            .field("move_power", &self.move_power)
            .finish_non_exhaustive()
    }
}

impl SequentialExecutor {
    pub fn new(status: Arc<StatusStore>, move_power: u8) -> Self {
        Self {
            status,
            channel: Mutex::new(None),
            state: Mutex::new(RunState::default()),
            move_power: i32::from(move_power),
        }
    }

    pub fn status(&self) -> &Arc<StatusStore> {
        &self.status
    }

    /// Attach a device channel and mark the robot connected.
    pub fn connect(&self, channel: Arc<dyn DeviceChannel>) {
        *lock(&self.channel) = Some(channel);
        self.status.update(|s| {
            s.connected = true;
            s.error = None;
        });
        info!("robot connected");
    }

    /// Stop any running program, drop the channel and reset the status.
    pub fn disconnect(&self) {
        self.stop();
        *lock(&self.channel) = None;
        self.status.reset();
        info!("robot disconnected");
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.channel)
            .as_ref()
            .is_some_and(|channel| channel.is_connected())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Commands still waiting in the queue (not counting the in-flight one).
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Begin draining `commands` on a background task.
    pub fn start(
        self: &Arc<Self>,
        commands: Vec<RobotCommand>,
    ) -> Result<RunHandle, ExecutorError> {
        let (generation, stop_rx, change) = {
            let mut state = lock(&self.state);
            if state.running {
                debug!("rejecting start: a program is already running");
                return Err(ExecutorError::AlreadyRunning);
            }
            if !self.is_connected() {
                debug!("rejecting start: robot is not connected");
                return Err(ExecutorError::NotConnected);
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            state.running = true;
            state.generation += 1;
            state.queue = commands.into();
            state.stop_tx = Some(stop_tx);
            let change = self.status.commit(|s| {
                s.running = true;
                s.error = None;
            });
            info!(
                generation = state.generation,
                commands = state.queue.len(),
                "starting robot program"
            );
            (state.generation, stop_rx, change)
        };
        self.status.publish(change);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.drain(generation, stop_rx).await });
        Ok(RunHandle { handle })
    }

    /// `start` and wait for the program to finish.
    pub async fn run(self: &Arc<Self>, commands: Vec<RobotCommand>) -> Result<RunReport, ExecutorError> {
        Ok(self.start(commands)?.wait().await)
    }

    /// Clear pending commands, go idle and stop both motors.
    ///
    /// Safe to call while idle; the motors are stopped either way.
    pub fn stop(&self) {
        let (was_running, change) = {
            let mut state = lock(&self.state);
            let was_running = state.running;
            state.running = false;
            state.queue.clear();
            if let Some(stop_tx) = state.stop_tx.take() {
                let _ = stop_tx.send(true);
            }
            let change = self.status.commit(|s| {
                s.running = false;
                s.motors.stop_all();
            });
            (was_running, change)
        };

        if was_running {
            info!("robot program stopped");
        }

        self.status.publish(change);
        self.forward(RobotCommand::stop_motors());
    }

    async fn drain(&self, generation: u64, mut stop_rx: watch::Receiver<bool>) -> RunReport {
        let mut report = RunReport::default();

        loop {
            let next = {
                let mut state = lock(&self.state);
                if !self.is_current(&state, generation) {
                    report.stopped = true;
                    break;
                }
                state.queue.pop_front()
            };
            let Some(command) = next else { break };

            match self.execute(generation, command, &mut stop_rx).await {
                Step::Done => report.executed += 1,
                Step::Skipped => report.skipped += 1,
                Step::Interrupted => {
                    report.stopped = true;
                    break;
                }
            }
        }

        let finished = {
            let mut state = lock(&self.state);
            if self.is_current(&state, generation) {
                state.running = false;
                state.stop_tx = None;
                Some(self.status.commit(|s| s.running = false))
            } else {
                None
            }
        };
        if let Some(change) = finished {
            self.status.publish(change);
        }

        info!(
            generation,
            executed = report.executed,
            skipped = report.skipped,
            stopped = report.stopped,
            "robot program finished"
        );
        report
    }

    async fn execute(
        &self,
        generation: u64,
        command: RobotCommand,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Step {
        debug!(command = command.kind(), "executing robot command");

        match command {
            RobotCommand::SetMotorPower { motor, power, .. } => {
                let state = MotorState::from_signed_power(power);
                self.apply(generation, command, |s| s.motors.set(motor, state))
            }
            RobotCommand::Move {
                direction,
                duration_ms,
                ..
            } => {
                let (left, right) = move_motor_states(direction, self.move_power);
                let step = self.apply(generation, command, |s| {
                    s.motors.set(Motor::Left, left);
                    s.motors.set(Motor::Right, right);
                });
                if !matches!(step, Step::Done) {
                    return step;
                }
                if !delay(Duration::from_millis(duration_ms), stop_rx).await {
                    return Step::Interrupted;
                }
                self.apply(generation, RobotCommand::stop_motors(), |s| s.motors.stop_all())
            }
            RobotCommand::StopMotors { .. } => {
                self.apply(generation, command, |s| s.motors.stop_all())
            }
            RobotCommand::SetServoAngle {
                servo,
                angle,
                timestamp,
            } => {
                let angle = angle.clamp(0.0, 180.0);
                let clamped = RobotCommand::SetServoAngle {
                    servo,
                    angle,
                    timestamp,
                };
                self.apply(generation, clamped, |s| {
                    s.servos.insert(servo, angle);
                })
            }
            RobotCommand::Wait { duration_ms, .. } => {
                if delay(Duration::from_millis(duration_ms), stop_rx).await {
                    Step::Done
                } else {
                    Step::Interrupted
                }
            }
            RobotCommand::Unknown => {
                warn!("skipping unknown robot command");
                Step::Skipped
            }
        }
    }

    /// Apply a status change and forward `command`, unless the run was
    /// stopped in the meantime.
    ///
    /// The change is committed under the run-state lock so a concurrent
    /// `stop()` is ordered strictly before or after it. Listeners are
    /// notified once the lock is released.
    fn apply<F>(&self, generation: u64, command: RobotCommand, change: F) -> Step
    where
        F: FnOnce(&mut super::status::RobotStatus),
    {
        let change = {
            let state = lock(&self.state);
            if !self.is_current(&state, generation) {
                return Step::Interrupted;
            }
            let change = self.status.commit(change);
            self.forward(command);
            change
        };
        self.status.publish(change);
        Step::Done
    }

    fn is_current(&self, state: &RunState, generation: u64) -> bool {
        state.running && state.generation == generation
    }

    /// Send `command` to the device, or simulate locally when there is none.
    fn forward(&self, command: RobotCommand) {
        let channel = lock(&self.channel).clone();
        match channel {
            Some(channel) if channel.is_connected() => {
                let kind = command.kind();
                if let Err(e) = channel.send(DeviceMessage::Command(command)) {
                    warn!(command = kind, error = %e, "failed to forward command; applied locally only");
                }
            }
            _ => debug!(command = command.kind(), "no device connected; simulated locally"),
        }
    }
}

/// Sleep for `duration` unless a stop is signalled first.
///
/// Returns false when interrupted.
async fn delay(duration: Duration, stop_rx: &mut watch::Receiver<bool>) -> bool {
    if *stop_rx.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        // Either an explicit stop or the sender going away.
        _ = stop_rx.changed() => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::command::MotorDirection;

    #[test]
    fn direction_table_is_symmetric_for_straight_moves() {
        let (l, r) = move_motor_states(MoveDirection::Forward, 50);
        assert_eq!((l.power, l.direction), (50, MotorDirection::Forward));
        assert_eq!(l, r);

        let (l, r) = move_motor_states(MoveDirection::Backward, 50);
        assert_eq!((l.power, l.direction), (50, MotorDirection::Backward));
        assert_eq!(l, r);
    }

    #[test]
    fn turns_hold_the_inner_wheel() {
        let (l, r) = move_motor_states(MoveDirection::Left, 40);
        assert_eq!(l, MotorState::STOPPED);
        assert_eq!(r.power, 40);

        let (l, r) = move_motor_states(MoveDirection::Right, 40);
        assert_eq!(l.power, 40);
        assert_eq!(r, MotorState::STOPPED);
    }

    #[tokio::test]
    async fn start_without_channel_is_rejected() {
        let executor = Arc::new(SequentialExecutor::new(Arc::new(StatusStore::new()), 50));
        let err = executor.start(vec![RobotCommand::stop_motors()]).unwrap_err();
        assert_eq!(err, ExecutorError::NotConnected);
        assert!(!executor.is_running());
    }
}
