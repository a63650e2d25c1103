//! Motorlot Services Layer
//!
//! Offline maintenance services that run outside the request path. The
//! upload request path itself lives in motorlot-api.

pub mod repair;

pub use repair::{RepairSweep, SweepReport};
