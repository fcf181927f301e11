//! Domain models for the dosetrack system.

mod dose;
mod medication;
mod prescription;
mod schedule;
mod summary;

pub use dose::*;
pub use medication::*;
pub use prescription::*;
pub use schedule::*;
pub use summary::*;
