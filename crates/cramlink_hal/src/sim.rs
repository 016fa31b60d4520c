use crate::traits::{PinMode, SignalLine};
use std::sync::{Arc, Mutex};

struct Net {
    level: bool,
    mode: PinMode,
    writes: Vec<bool>,
}

/// Simulated signal line backed by a shared net.
///
/// Cloning yields another handle onto the same net, so a test (or a
/// simulated device thread) can observe or `drive` a line that one of
/// the protocol engines owns as its `SignalLine`.
#[derive(Clone)]
pub struct SimLine {
    net: Arc<Mutex<Net>>,
}

impl SimLine {
    pub fn new(initial: bool) -> Self {
        Self {
            net: Arc::new(Mutex::new(Net {
                level: initial,
                mode: PinMode::Input,
                writes: Vec::new(),
            })),
        }
    }

    /// Move the net from the device side, without recording a write.
    pub fn drive(&self, level: bool) {
        self.net.lock().unwrap().level = level;
    }

    pub fn level(&self) -> bool {
        self.net.lock().unwrap().level
    }

    pub fn mode(&self) -> PinMode {
        self.net.lock().unwrap().mode
    }

    /// Every level written through `SignalLine::set`, in order.
    pub fn writes(&self) -> Vec<bool> {
        self.net.lock().unwrap().writes.clone()
    }
}

impl SignalLine for SimLine {
    fn configure(&mut self, mode: PinMode) {
        log::trace!("sim line reconfigured: {mode:?}");
        self.net.lock().unwrap().mode = mode;
    }

    fn set(&mut self, high: bool) {
        let mut net = self.net.lock().unwrap();
        net.level = high;
        net.writes.push(high);
    }

    fn read(&self) -> bool {
        self.net.lock().unwrap().level
    }
}
