use crate::config::DEFAULT_LOW_BATTERY_THRESHOLD;
use crate::protocol::BatteryLevel;
use chrono::{DateTime, Local};

pub const CONNECTING_MESSAGE: &str = "Connecting...";
pub const BUSY_MESSAGE: &str =
    "Someone else is already connected to the Dalek. Trying to connect...";
pub const LOST_MESSAGE: &str = "Lost connection to the Dalek. Trying to reconnect...";

/// Modal shown whenever the device is not ours to control.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityDialog {
    message: Option<&'static str>,
}

impl ConnectivityDialog {
    pub fn new() -> Self {
        Self {
            message: Some(CONNECTING_MESSAGE),
        }
    }

    /// `None` while the dialog is hidden
    pub fn message(&self) -> Option<&'static str> {
        self.message
    }

    pub fn hide(&mut self) {
        self.message = None;
    }

    pub fn busy(&mut self) {
        self.message = Some(BUSY_MESSAGE);
    }

    pub fn lost(&mut self) {
        self.message = Some(LOST_MESSAGE);
    }
}

impl Default for ConnectivityDialog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct BatteryIndicator {
    level: Option<BatteryLevel>,
    updated_at: Option<DateTime<Local>>,
    low_threshold: f64,
}

impl BatteryIndicator {
    pub fn new(low_threshold: f64) -> Self {
        Self {
            level: None,
            updated_at: None,
            low_threshold,
        }
    }

    pub fn set(&mut self, level: BatteryLevel) {
        self.level = Some(level);
        self.updated_at = Some(Local::now());
    }

    pub fn disconnected(&mut self) {
        self.level = None;
    }

    pub fn text(&self) -> String {
        match self.level {
            Some(level) => level.to_string(),
            None => "?".to_string(),
        }
    }

    pub fn is_low(&self) -> bool {
        self.level
            .is_some_and(|level| level.value() < self.low_threshold)
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }
}

impl Default for BatteryIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_BATTERY_THRESHOLD)
    }
}
