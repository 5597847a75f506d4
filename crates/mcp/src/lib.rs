// MCP tool server exposing the X (Twitter) API

pub mod adapter;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod tools;

pub use dispatcher::{DispatchConfig, Dispatcher, ToolInvocation};
pub use server::McpServer;
pub use settings::{ConfigError, Settings};
pub use tools::{ToolDefinition, ToolRegistry};
