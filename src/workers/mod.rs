//! Background workers
//!
//! Feed threads of the synthetic video source and the stop signal used to
//! cancel them.

pub mod sos;
pub mod synthetic;

pub use sos::SignalOfStop;
pub use synthetic::SyntheticSource;
