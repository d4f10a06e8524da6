// src/robot/channel.rs

//! Message channel between the executor and a (physical or simulated) device.
//!
//! The executor only knows the [`DeviceChannel`] trait. A concrete transport
//! (serial bridge, websocket, the in-process [`spawn_loopback_device`]) plugs
//! in behind it without touching the executor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::command::RobotCommand;
use super::error::ChannelError;
use super::status::{DeviceReport, StatusStore};

/// Capacity of the mpsc queues backing [`MpscChannel`].
pub const CHANNEL_CAPACITY: usize = 64;

/// Everything that can travel over a device channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeviceMessage {
    /// Outbound: a command for the device to carry out.
    Command(RobotCommand),
    /// Inbound: the device's view of its own state.
    StatusUpdate(DeviceReport),
}

/// Outbound half of a device connection.
pub trait DeviceChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `message` for the device without waiting for delivery.
    fn send(&self, message: DeviceMessage) -> Result<(), ChannelError>;
}

/// `DeviceChannel` backed by a bounded tokio mpsc queue.
#[derive(Debug, Clone)]
pub struct MpscChannel {
    tx: mpsc::Sender<DeviceMessage>,
}

impl MpscChannel {
    /// A channel plus the receiver a transport task should drain.
    pub fn pair() -> (Self, mpsc::Receiver<DeviceMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

impl DeviceChannel for MpscChannel {
    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, message: DeviceMessage) -> Result<(), ChannelError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

/// Drain messages coming *from* a device into the status store.
///
/// `status_update` reports are merged wholesale; anything else is ignored.
/// The task ends when every sender for `inbound` has been dropped.
pub fn spawn_inbound_listener(
    mut inbound: mpsc::Receiver<DeviceMessage>,
    status: Arc<StatusStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            match message {
                DeviceMessage::StatusUpdate(report) => {
                    debug!("merging device status update");
                    status.apply_report(report);
                }
                DeviceMessage::Command(cmd) => {
                    debug!(command = cmd.kind(), "ignoring inbound command message");
                }
            }
        }
        debug!("inbound device channel closed");
    })
}

/// In-process stand-in for a robot.
///
/// Accepts commands and logs them; it produces no telemetry of its own, so
/// the status store reflects exactly what the executor applied.
pub fn spawn_loopback_device() -> (MpscChannel, JoinHandle<usize>) {
    let (channel, mut outbound) = MpscChannel::pair();

    let handle = tokio::spawn(async move {
        info!("loopback device attached");
        let mut received = 0usize;
        while let Some(message) = outbound.recv().await {
            if let DeviceMessage::Command(cmd) = message {
                received += 1;
                debug!(command = cmd.kind(), received, "loopback device received command");
            }
        }
        info!(received, "loopback device detached");
        received
    });

    (channel, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inbound_reports_reach_the_store() {
        let status = Arc::new(StatusStore::new());
        let (tx, rx) = mpsc::channel(4);
        let listener = spawn_inbound_listener(rx, Arc::clone(&status));

        tx.send(DeviceMessage::StatusUpdate(DeviceReport {
            error: Some("battery low".to_string()),
            ..DeviceReport::default()
        }))
        .await
        .unwrap();
        drop(tx);
        listener.await.unwrap();

        assert_eq!(status.snapshot().error.as_deref(), Some("battery low"));
    }

    #[tokio::test]
    async fn closed_receiver_disconnects_channel() {
        let (channel, rx) = MpscChannel::pair();
        assert!(channel.is_connected());
        drop(rx);

        assert!(!channel.is_connected());
        assert_eq!(
            channel.send(DeviceMessage::Command(RobotCommand::stop_motors())),
            Err(ChannelError::Closed)
        );
    }

    #[test]
    fn messages_use_adjacent_tagging() {
        let json = serde_json::to_value(DeviceMessage::Command(RobotCommand::StopMotors {
            timestamp: 3,
        }))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "command", "data": {"type": "stop_motors", "timestamp": 3}})
        );
    }
}
