/// Direction of a signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// One direction-configurable digital I/O line.
///
/// Callers bind a concrete pin (GPIO register, FTDI channel, simulated
/// net) and pass it in boxed. Levels are raw electrical levels; the
/// protocol engines handle active-low conventions themselves.
pub trait SignalLine {
    fn configure(&mut self, mode: PinMode);
    fn set(&mut self, high: bool);
    fn read(&self) -> bool;
}

impl SignalLine for Box<dyn SignalLine + Send> {
    fn configure(&mut self, mode: PinMode) {
        (**self).configure(mode)
    }
    fn set(&mut self, high: bool) {
        (**self).set(high)
    }
    fn read(&self) -> bool {
        (**self).read()
    }
}

impl SignalLine for Box<dyn SignalLine> {
    fn configure(&mut self, mode: PinMode) {
        (**self).configure(mode)
    }
    fn set(&mut self, high: bool) {
        (**self).set(high)
    }
    fn read(&self) -> bool {
        (**self).read()
    }
}
