//! Integration test modules for tutti-capture
//!
//! - capture: start/pause/resume/stop workflows decoded back to samples
//! - automation: automation rendered into the signal before capture
//! - demux: recorded output fed to the demuxer in arbitrary fragments

pub mod automation;
pub mod capture;
pub mod demux;
