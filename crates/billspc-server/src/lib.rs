//! # billspc-server
//!
//! Daemon library for Bill's PC: starts the peripheral session and serves
//! its display and status over HTTP.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod runtime;
pub mod state;
