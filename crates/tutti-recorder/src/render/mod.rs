//! Render realm: a thread processing capture nodes in fixed quanta.

mod context;
mod node;

pub use context::{RenderContext, RenderHandle};
pub use node::{CaptureNode, NodeId, NodePort, NodeRequest, NodeState};
