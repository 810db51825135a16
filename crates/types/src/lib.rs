//! Core value types for the TriSplit donation splitter: addresses, units,
//! epoch policies and settlement records.

pub mod address;
pub mod policy;
pub mod settlement;
pub mod units;

pub use address::*;
pub use policy::*;
pub use settlement::*;
pub use units::*;
