//! Robot RPC stack.
//!
//! Bottom to top: [`transport`] opens the platform connection, [`h2`]
//! speaks just enough HTTP/2 for one request per connection, [`frame`]
//! handles gRPC message framing, [`proto`] is the hand-rolled protobuf
//! codec, [`messages`] gives the wire messages names, and [`client`]
//! ties it all into a blocking typed call surface.

pub mod client;
pub mod frame;
pub mod h2;
pub mod messages;
pub mod proto;
pub mod resolver;
pub mod transport;

pub use client::{DEFAULT_TIMEOUT, ResultCode, RobotApiPort, RpcClient};
pub use messages::{
    Location, RobotCommand, Shelf, Shortcut, StartCommandRequest, StartCommandResponse,
};
