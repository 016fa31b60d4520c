use serde::Deserialize;
use std::time::Duration;

/// Protocol timing, deserialized from the `[timing]` table.
///
/// Defaults follow the device datasheet minimums: a 2 µs reset pulse,
/// 1300 µs of post-reset settle, and 1 ms between done polls.
#[derive(Debug, Clone, Deserialize)]
pub struct Timing {
    #[serde(default = "default_reset_pulse_us")]
    pub reset_pulse_us: u64,
    #[serde(default = "default_reset_settle_us")]
    pub reset_settle_us: u64,
    #[serde(default = "default_done_poll_ms")]
    pub done_poll_ms: u64,
}

fn default_reset_pulse_us() -> u64 {
    2
}
fn default_reset_settle_us() -> u64 {
    1300
}
fn default_done_poll_ms() -> u64 {
    1
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reset_pulse_us: default_reset_pulse_us(),
            reset_settle_us: default_reset_settle_us(),
            done_poll_ms: default_done_poll_ms(),
        }
    }
}

impl Timing {
    /// Parse from a TOML document with an optional `[timing]` table.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            timing: Timing,
        }
        toml::from_str::<Doc>(content).map(|doc| doc.timing)
    }

    pub fn reset_pulse(&self) -> Duration {
        Duration::from_micros(self.reset_pulse_us)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_micros(self.reset_settle_us)
    }

    pub fn done_poll(&self) -> Duration {
        Duration::from_millis(self.done_poll_ms)
    }
}
