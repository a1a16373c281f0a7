//! Domain layer - value types with no I/O.

pub mod bus;
pub mod foundation;
