//! Boundary-scan shift engine.
//!
//! Bit-bangs a JTAG-style four-wire scan interface directly on raw
//! signal lines, independent of the serial engine: enable (active
//! low), clock, data-in (to the target), data-out (from the target).
//! One shift per clock cycle: the target's outgoing bit is sampled on
//! the low phase, the incoming bit is driven, and the rising edge
//! completes the shift.

use cramlink_hal::{PinMode, SignalLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// Zero bits, both buffers absent, or a buffer shorter than
    /// `ceil(bits / 8)`. Rejected before any line toggles.
    #[error("bad send/recv buffer combination")]
    BadBuffer,
}

/// Handle on a scan chain. `close` consumes the handle and tri-states
/// the lines; construct a new one to talk to the chain again.
pub struct ScanChain {
    en: Box<dyn SignalLine>,
    clk: Box<dyn SignalLine>,
    data_in: Box<dyn SignalLine>,
    data_out: Box<dyn SignalLine>,
}

impl ScanChain {
    /// Take ownership of the four scan lines and put them in their
    /// safe idle state: clock, data-in and enable driven high (the
    /// chain starts disabled), data-out left as an input.
    pub fn new(
        mut en: Box<dyn SignalLine>,
        mut clk: Box<dyn SignalLine>,
        mut data_in: Box<dyn SignalLine>,
        mut data_out: Box<dyn SignalLine>,
    ) -> Self {
        clk.configure(PinMode::Output);
        clk.set(true);
        data_in.configure(PinMode::Output);
        data_in.set(true);
        data_out.configure(PinMode::Input);
        en.configure(PinMode::Output);
        en.set(true);
        Self {
            en,
            clk,
            data_in,
            data_out,
        }
    }

    /// Engage or disengage the chain. Must be engaged for `xfer` to
    /// reach the target.
    pub fn enable(&mut self, on: bool) {
        self.en.set(!on);
    }

    /// Shift `bits` bits through the chain.
    ///
    /// The first byte of `send` holds the bits scanned deepest into
    /// the chain; bits go out MSB-first within each byte. When `bits`
    /// is not a multiple of 8, the first byte carries only the
    /// remainder, in its top bit positions; the matching `recv` byte
    /// is padded with zeros below the sampled bits.
    ///
    /// With `send` absent, each sampled output bit is driven straight
    /// back in: a circular scan that rotates the target's register
    /// without losing its contents. With `recv` absent nothing is
    /// written back. At least one of the two must be supplied.
    pub fn xfer(
        &mut self,
        bits: usize,
        send: Option<&[u8]>,
        mut recv: Option<&mut [u8]>,
    ) -> Result<(), ScanError> {
        if bits == 0 {
            return Err(ScanError::BadBuffer);
        }
        let len = bits.div_ceil(8);
        if send.is_none() && recv.is_none() {
            return Err(ScanError::BadBuffer);
        }
        if send.is_some_and(|s| s.len() < len) {
            return Err(ScanError::BadBuffer);
        }
        if recv.as_deref().is_some_and(|r| r.len() < len) {
            return Err(ScanError::BadBuffer);
        }

        log::trace!("scan xfer: {bits} bits, circular: {}", send.is_none());
        let mut valid = bits % 8;
        if valid == 0 {
            valid = 8;
        }
        for i in 0..len {
            let mut sampled = 0u8;
            for k in 0..valid {
                self.clk.set(false);
                let bit = self.data_out.read();
                sampled = (sampled << 1) | u8::from(bit);
                let drive = match send {
                    Some(s) => s[i] & (0x80 >> k) != 0,
                    None => bit,
                };
                self.data_in.set(drive);
                self.clk.set(true);
            }
            if let Some(r) = recv.as_deref_mut() {
                r[i] = sampled << (8 - valid);
            }
            valid = 8;
        }
        Ok(())
    }

    /// Disengage the chain and leave all four lines tri-stated.
    pub fn close(mut self) {
        self.enable(false);
        self.en.configure(PinMode::Input);
        self.clk.configure(PinMode::Input);
        self.data_in.configure(PinMode::Input);
        self.data_out.configure(PinMode::Input);
        log::debug!("scan chain closed, lines tri-stated");
    }
}
