use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use blockbot::robot::{ChannelError, DeviceChannel, DeviceMessage, RobotCommand};

/// Fake device: records every message, can be flipped to disconnected or
/// to reject sends.
#[derive(Clone)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<DeviceMessage>>>,
    connected: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every subsequent `send` fail with `ChannelError::Full`.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Commands received so far, timestamps zeroed.
    pub fn commands(&self) -> Vec<RobotCommand> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                DeviceMessage::Command(cmd) => Some(cmd.without_timestamp()),
                DeviceMessage::StatusUpdate(_) => None,
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.commands().iter().map(RobotCommand::kind).collect()
    }

    pub fn arc(&self) -> Arc<dyn DeviceChannel> {
        Arc::new(self.clone())
    }
}

impl DeviceChannel for RecordingChannel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, message: DeviceMessage) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Full);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
