//! Synchronous serial transfer engine for cramlink.
//!
//! Byte streams move across two bounded word FIFOs: an outbound queue
//! the engine fills and an inbound queue it drains, with the bus
//! hardware (or a simulated device) servicing the far ends. Every
//! transfer starts with a one-word header carrying the bit count
//! `8 * len - 1`, then one left-justified word per payload byte.
//!
//! The send and receive sides of a duplex transfer may be the same
//! storage (`transfer_in_place`). That is safe because the drain
//! cursor is never allowed to pass the fill cursor: byte `i` is read
//! out of the buffer before the response for byte `i` overwrites it.
//! The gate is structural, not a scheduling accident.

use cramlink_hal::{PinMode, SignalLine};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

/// Hardware FIFO depth on the reference part.
pub const DEFAULT_FIFO_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A transfer was requested with an empty payload; the bus header
    /// has no encoding for zero bits.
    #[error("transfer payload is empty")]
    EmptyTransfer,
    /// The far end of the FIFO pair is gone.
    #[error("bus peer detached")]
    BusDetached,
    /// FIFO depth must be at least one slot.
    #[error("FIFO depth must be at least 1")]
    ZeroDepthFifo,
}

/// Bus-level length header for a payload of `len` bytes.
pub fn bit_header(len: usize) -> u32 {
    (len as u32) * 8 - 1
}

/// Far end of the FIFO pair, serviced by bus glue or a test device.
///
/// Outbound words arrive on `from_host` (header first, then payload
/// bytes in bits 31..24); the device pushes one word per payload byte
/// back on `to_host`, received byte in bits 7..0.
pub struct DevicePort {
    pub from_host: Receiver<u32>,
    pub to_host: Sender<u32>,
}

/// Host end of the FIFO pair.
pub struct BusLink {
    tx: Sender<u32>,
    rx: Receiver<u32>,
}

impl BusLink {
    /// Create a FIFO pair with `depth` slots per direction.
    pub fn bounded(depth: usize) -> Result<(BusLink, DevicePort), EngineError> {
        if depth == 0 {
            return Err(EngineError::ZeroDepthFifo);
        }
        let (tx, from_host) = bounded(depth);
        let (to_host, rx) = bounded(depth);
        Ok((BusLink { tx, rx }, DevicePort { from_host, to_host }))
    }

    fn offer(&self, word: u32, progress: &mut bool) -> Result<bool, EngineError> {
        match self.tx.try_send(word) {
            Ok(()) => {
                *progress = true;
                Ok(true)
            }
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(EngineError::BusDetached),
        }
    }

    fn take(&self, progress: &mut bool) -> Result<Option<u32>, EngineError> {
        match self.rx.try_recv() {
            Ok(word) => {
                *progress = true;
                Ok(Some(word))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::BusDetached),
        }
    }

    /// Send `send`, draining (and discarding) the matching inbound words.
    fn write(&self, send: &[u8]) -> Result<(), EngineError> {
        if send.is_empty() {
            return Err(EngineError::EmptyTransfer);
        }
        log::debug!("bus write: {} bytes", send.len());
        let mut header_sent = false;
        let mut fill = 0;
        let mut drain = 0;
        while drain < send.len() {
            let mut progress = false;
            if !header_sent {
                header_sent = self.offer(bit_header(send.len()), &mut progress)?;
            } else if fill < send.len()
                && self.offer(u32::from(send[fill]) << 24, &mut progress)?
            {
                fill += 1;
            }
            if drain < fill && self.take(&mut progress)?.is_some() {
                drain += 1;
            }
            if !progress {
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    /// Duplex transfer where send and receive share `buf`.
    ///
    /// The pre-transfer value of `buf[i]` goes out before the inbound
    /// byte for position `i` replaces it.
    fn transfer_in_place(&self, buf: &mut [u8]) -> Result<(), EngineError> {
        if buf.is_empty() {
            return Err(EngineError::EmptyTransfer);
        }
        log::debug!("bus duplex transfer: {} bytes", buf.len());
        let mut header_sent = false;
        let mut fill = 0;
        let mut drain = 0;
        while drain < buf.len() {
            let mut progress = false;
            if !header_sent {
                header_sent = self.offer(bit_header(buf.len()), &mut progress)?;
            } else if fill < buf.len()
                && self.offer(u32::from(buf[fill]) << 24, &mut progress)?
            {
                fill += 1;
            }
            // Fill stays ahead of drain so the aliased slot has
            // already been transmitted when it is overwritten.
            if drain < fill {
                if let Some(word) = self.take(&mut progress)? {
                    buf[drain] = word as u8;
                    drain += 1;
                }
            }
            if !progress {
                std::thread::yield_now();
            }
        }
        Ok(())
    }
}

/// Raises chip-select on every exit path out of a scoped transfer.
struct Select<'a> {
    cs: &'a mut Box<dyn SignalLine + Send>,
}

impl<'a> Select<'a> {
    fn assert(cs: &'a mut Box<dyn SignalLine + Send>) -> Self {
        cs.set(false);
        Self { cs }
    }
}

impl Drop for Select<'_> {
    fn drop(&mut self) {
        self.cs.set(true);
    }
}

/// One synchronous-bus peripheral instance: the FIFO pair plus the
/// chip-select line framing its transactions.
pub struct Engine {
    link: BusLink,
    cs: Box<dyn SignalLine + Send>,
}

impl Engine {
    pub fn new(link: BusLink, mut cs: Box<dyn SignalLine + Send>) -> Self {
        cs.configure(PinMode::Output);
        cs.set(true);
        Engine { link, cs }
    }

    /// Drive chip-select directly (active low: `asserted` pulls it low).
    ///
    /// The loader holds the line low across its reset phase, outside
    /// any transfer.
    pub fn set_chip_select(&mut self, asserted: bool) {
        self.cs.set(!asserted);
    }

    /// Transmit `send` without touching chip-select.
    pub fn write(&mut self, send: &[u8]) -> Result<(), EngineError> {
        self.link.write(send)
    }

    /// Duplex transfer in place without touching chip-select.
    pub fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), EngineError> {
        self.link.transfer_in_place(buf)
    }

    /// Transmit `send` with chip-select asserted for the duration.
    pub fn write_selected(&mut self, send: &[u8]) -> Result<(), EngineError> {
        let _cs = Select::assert(&mut self.cs);
        self.link.write(send)
    }

    /// Duplex in-place transfer with chip-select asserted for the duration.
    pub fn transfer_in_place_selected(&mut self, buf: &mut [u8]) -> Result<(), EngineError> {
        let _cs = Select::assert(&mut self.cs);
        self.link.transfer_in_place(buf)
    }
}
