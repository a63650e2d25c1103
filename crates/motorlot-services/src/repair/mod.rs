mod service;

pub use service::{RepairSweep, SweepReport};
