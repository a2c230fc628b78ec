//! kobopatch library
//!
//! Command-line front end for patching binaries inside Kobo firmware updates.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
