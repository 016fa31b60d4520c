//! CRAM configuration-load sequencer.
//!
//! Resets the FPGA, streams a raw bitstream into its configuration
//! memory over the serial engine, and waits for the device to assert
//! its done line. The sequence and timing follow the Lattice iCE40
//! SPI-target configuration protocol:
//!
//! 1. Assert creset with chip-select held low, release after the reset
//!    pulse, then wait out the settle time.
//! 2. One dummy byte (8 bus clocks) with chip-select *high* wakes the
//!    device.
//! 3. The bitstream itself goes out chip-select-scoped. This phase is
//!    not cancellable once started; cancellation is honored only in
//!    the done-polling loop that follows.
//! 4. After done is observed, 7 dummy bytes (49 bus clocks) let the
//!    device finish internal start-up.
//!
//! A load that times out is recoverable: call `load` again to rerun
//! the whole sequence.

pub mod config;

pub use config::Timing;

use cramlink_engine::{Engine, EngineError};
use cramlink_hal::{CancelToken, PinMode, SignalLine};

/// Bytes whose content the device ignores; only their clocks matter.
const WAKE: [u8; 1] = [0x00];
const POSTAMBLE: [u8; 7] = [0x00; 7];

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LoadError {
    /// The cancellation token fired before the done signal was seen.
    #[error("timed out waiting for the done signal")]
    Timeout,
    #[error("bus transfer failed: {0}")]
    Engine(#[from] EngineError),
}

/// Where the loader currently is in the configuration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Reset,
    ReadySignal,
    Uploading,
    AwaitDone,
    Postamble,
    Complete,
    TimedOut,
}

/// The control lines the loader drives besides the bus itself.
pub struct LoaderPins {
    /// Device reset, active low.
    pub creset: Box<dyn SignalLine + Send>,
    /// Configuration-done indication from the device, active high.
    pub cdone: Box<dyn SignalLine + Send>,
    /// Gates the free-running logic clock to the device.
    pub clock_gate: Box<dyn SignalLine + Send>,
}

pub struct ConfigLoader {
    engine: Engine,
    pins: LoaderPins,
    timing: Timing,
    phase: Phase,
}

impl ConfigLoader {
    pub fn new(engine: Engine, pins: LoaderPins, timing: Timing) -> Self {
        Self {
            engine,
            pins,
            timing,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Reset the device and upload `bitstream` into its configuration
    /// memory.
    ///
    /// `cancel` is checked once per poll interval while waiting for the
    /// done signal; it has no effect during reset timing or the upload
    /// itself. On timeout no postamble is sent and the whole load may
    /// be retried.
    pub fn load(&mut self, bitstream: &[u8], cancel: &CancelToken) -> Result<(), LoadError> {
        self.enter(Phase::Reset);
        self.pins.clock_gate.configure(PinMode::Output);
        self.pins.clock_gate.set(true);
        self.pins.creset.configure(PinMode::Output);
        self.pins.cdone.configure(PinMode::Input);

        self.pins.creset.set(false);
        self.engine.set_chip_select(true);
        std::thread::sleep(self.timing.reset_pulse());
        self.pins.creset.set(true);

        self.enter(Phase::ReadySignal);
        std::thread::sleep(self.timing.reset_settle());

        // Eight clocks with chip-select high bring the device out of
        // its post-reset state before the real payload.
        self.engine.set_chip_select(false);
        self.engine.write(&WAKE)?;

        self.enter(Phase::Uploading);
        log::info!("uploading bitstream: {} bytes", bitstream.len());
        self.engine.write_selected(bitstream)?;

        self.enter(Phase::AwaitDone);
        loop {
            if self.pins.cdone.read() {
                break;
            }
            if cancel.is_cancelled() {
                self.enter(Phase::TimedOut);
                return Err(LoadError::Timeout);
            }
            std::thread::sleep(self.timing.done_poll());
        }

        // 49 clocks after done goes high finish device start-up.
        self.enter(Phase::Postamble);
        self.engine.write(&POSTAMBLE)?;

        self.enter(Phase::Complete);
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("config load: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}
