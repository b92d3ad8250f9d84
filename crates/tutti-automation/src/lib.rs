//! Scheduled parameter automation for Tutti.
//!
//! Provides [`AutomationTimeline`], an ordered event list that replays
//! set/ramp/target/curve instructions against a clock, and [`ParamGraph`],
//! an arena that owns nodes and their automatable [`Param`]s.
//!
//! # Example
//!
//! ```ignore
//! use tutti_automation::{ParamDescriptor, ParamGraph};
//!
//! let mut graph = ParamGraph::new();
//! let amp = graph.add_node("amp");
//! let gain = graph.add_param(amp, ParamDescriptor::new("gain", 1.0).with_range(0.0, 1.0))?;
//!
//! graph
//!     .param_mut(gain)?
//!     .set_value_at_time(0.0, 0.0)?
//!     .linear_ramp_to_value_at_time(1.0, 2.0)?
//!     .cancel_and_hold_at_time(1.0)?;
//!
//! let mut block = [0.0f32; 128];
//! graph.render(gain, 0.5, 48_000.0, &mut block)?;
//! ```

pub mod error;
pub use error::{AutomationError, Result};

mod event;
mod graph;
mod timeline;

pub use event::{AutomationEvent, RampKind, ScheduledEvent};
pub use graph::{NodeId, Param, ParamDescriptor, ParamGraph, ParamId};
pub use timeline::AutomationTimeline;
