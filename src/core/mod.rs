//! Core traits and constants.

pub mod constants;
mod traits;

pub use traits::SessionTransport;
