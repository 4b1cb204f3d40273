//! Background I/O pressure: strictly alternating read and write passes.

mod signal;
pub use signal::AlternationSignal;

mod passes;
pub use passes::{DEFAULT_WRITE_CHUNK, read_input, write_output};

mod alternator;
pub use alternator::{CycleStats, IoAlternator, IoHandle, IoPlan};
