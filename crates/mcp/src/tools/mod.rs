mod catalog;
mod registry;
pub mod shape;

pub use catalog::{MAX_MEDIA_ATTACHMENTS, MAX_POLL_OPTION_CHARS, MAX_TWEET_CHARS};
pub use registry::{
    json_schema_array, json_schema_integer, json_schema_object, json_schema_string,
    redacted_arguments, BuildFn, ShapeFn, ToolDefinition, ToolRegistry,
};
