mod catalog;
pub mod connection;
mod lifecycle;
mod manager;
pub mod protocol;
mod resolver;
mod session;
pub mod types;

pub use connection::WebSocketConnector;
pub use manager::{CallError, McpManager};
pub use types::{McpServersConfig, PlatformConfig, ToolDescriptor};
