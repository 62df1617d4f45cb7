//! Chart workspace scaffolding with a live-reloading preview server.
//!
//! A workspace for a charting library is written to disk, served over HTTP,
//! and every connected browser is told to reload when one of its files
//! settles after an edit.

pub mod config;
pub mod control;
pub mod server;
pub mod utils;
pub mod workspace;
