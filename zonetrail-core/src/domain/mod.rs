//! Domain types shared by the detectors, the signal generator and the risk manager.

pub mod bar;
pub mod side;
pub mod snapshot;

pub use bar::Bar;
pub use side::Side;
pub use snapshot::{IndicatorSnapshot, OscillatorKind, OscillatorReading};
