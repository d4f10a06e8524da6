// src/robot/mod.rs

//! Robot side of blockbot.
//!
//! - `command`: the [`RobotCommand`] wire type produced by the block compiler.
//! - `status`: [`RobotStatus`] and the single-writer [`StatusStore`].
//! - `channel`: the [`DeviceChannel`] seam plus an mpsc-backed implementation
//!   and an in-process loopback device.
//! - `executor`: the [`SequentialExecutor`] state machine that drains a
//!   command queue against the status store and the channel.

pub mod channel;
pub mod command;
pub mod error;
pub mod executor;
pub mod status;

pub use channel::{
    CHANNEL_CAPACITY, DeviceChannel, DeviceMessage, MpscChannel, spawn_inbound_listener,
    spawn_loopback_device,
};
pub use command::{Motor, MotorDirection, MoveDirection, RobotCommand, now_millis};
pub use error::{ChannelError, ExecutorError};
pub use executor::{RunHandle, RunReport, SequentialExecutor, move_motor_states};
pub use status::{
    DeviceReport, ListenerId, MotorState, Motors, Position, RobotStatus, StatusStore,
};
