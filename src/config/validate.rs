// src/config/validate.rs

use std::net::SocketAddr;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BlockbotError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BlockbotError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let listen = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, listen))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<SocketAddr> {
    let listen = parse_listen(&cfg.server.listen)?;
    validate_timeouts(cfg)?;
    validate_robot(cfg)?;
    Ok(listen)
}

pub(crate) fn parse_listen(listen: &str) -> Result<SocketAddr> {
    listen.trim().parse::<SocketAddr>().map_err(|e| {
        BlockbotError::ConfigError(format!(
            "[server].listen must be a socket address like \"127.0.0.1:3001\" (got {listen:?}: {e})"
        ))
    })
}

fn validate_timeouts(cfg: &RawConfigFile) -> Result<()> {
    let timeouts = [
        ("[execution].default_timeout_ms", cfg.execution.default_timeout_ms),
        ("[packages].timeout_ms", cfg.packages.timeout_ms),
        ("[terminal].default_timeout_ms", cfg.terminal.default_timeout_ms),
    ];

    for (key, value) in timeouts {
        if value == 0 {
            return Err(BlockbotError::ConfigError(format!(
                "{key} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_robot(cfg: &RawConfigFile) -> Result<()> {
    let power = cfg.robot.move_power;
    if !(1..=100).contains(&power) {
        return Err(BlockbotError::ConfigError(format!(
            "[robot].move_power must be within 1..=100 (got {power})"
        )));
    }
    Ok(())
}
