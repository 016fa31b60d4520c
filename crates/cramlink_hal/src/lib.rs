//! Hardware abstraction seams for cramlink.
//!
//! The protocol engines never touch pins or timers directly; they work
//! against the `SignalLine` trait and the `CancelToken` primitive
//! defined here. `sim` provides shared-net simulated lines so the
//! engines can be exercised without hardware.

pub mod cancel;
pub mod sim;
pub mod traits;

pub use cancel::CancelToken;
pub use sim::SimLine;
pub use traits::{PinMode, SignalLine};
