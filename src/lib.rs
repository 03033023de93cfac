//! # tasmoforge - Tasmota Firmware Build Orchestrator
//!
//! tasmoforge turns a structured build configuration into custom Tasmota
//! firmware: it renders `user_config_override.h` and
//! `platformio_override.ini`, puts the checkout on the requested version and
//! supervises `pio run`, streaming the build output as it arrives.
//!
//! ## Quick Start
//!
//! ```bash
//! # Compile firmware from a build request
//! tasmoforge build --config request.json
//!
//! # Show the Tasmota version of the current checkout
//! tasmoforge version
//! ```
//!
//! ## Module Organization
//!
//! - [`compile`] - Build orchestration core (translation, subprocess
//!   supervision, output streaming)
//! - [`config`] - Settings, repository paths and the build request payload
//! - [`git`] - Branch-switch collaborator putting the checkout on the
//!   requested version

/// Build orchestration core.
pub mod compile;

/// Settings (`tasmoforge.toml`), repository paths and request payload.
pub mod config;

/// Version-control collaborator.
pub mod git;
