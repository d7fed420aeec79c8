//! Middleware

pub mod logging;
