//! Data models

pub mod psi;

pub use psi::*;
