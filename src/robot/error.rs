// src/robot/error.rs

use thiserror::Error;

/// Why the sequential executor refused to start a program.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("a program is already running")]
    AlreadyRunning,

    #[error("robot is not connected")]
    NotConnected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("device channel is closed")]
    Closed,

    #[error("device channel is full; message dropped")]
    Full,
}
