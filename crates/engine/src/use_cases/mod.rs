//! Application use cases.

pub mod continuity;
pub mod imaging;
pub mod reply;
pub mod turn;
