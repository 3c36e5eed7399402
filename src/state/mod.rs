//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunState`: The run lifecycle (init, running, completed, circuit open, fatal error)
//! - `HostState`: Per-host connection limit and pacing slot

mod host_state;
mod run_state;

pub use host_state::HostState;
pub use run_state::RunState;
