//! Plugin runtime bridge: wire protocol, host call handling, and session
//! supervision for the out-of-process extension host.

pub mod handler;
pub mod protocol;
pub mod session;

pub use handler::{HostCallHandler, NativeHostHandler};
pub use protocol::{HostCall, HostCallResult, Message};
pub use session::{
    BridgeError, BridgeEvent, BridgeResult, HostHandle, PluginSession, RunRequest, SessionState,
};
