//! Treadmill drivers.
//!
//! A driver owns the link to one belt: it accepts commands and surfaces the
//! belt's state as decoded status updates. The simulator driver replays the
//! belt's behavior in-process so the rest of the app can run without hardware.

mod simulator;

pub use simulator::SimulatorDriver;

use anyhow::Result;

use crate::protocol::{BeltState, Command};

/// Interface between the app and one treadmill.
pub trait TreadmillDriver {
    /// Send a command to the belt.
    fn send(&mut self, command: Command) -> Result<()>;

    /// Latest belt state, if one is available since the last poll.
    fn poll_state(&mut self) -> Option<BeltState>;

    fn is_connected(&self) -> bool;
}
