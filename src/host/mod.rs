//! Extension host process: one plugin command per invocation, rendered
//! into a retained UI tree and bridged back to the supervisor.

pub mod runtime;
pub mod tree;

pub use runtime::{run, HostChannel};
pub use tree::{UiDelta, UiNode, UiPatch, UiTree};
