// Core types for the xbridge MCP tool server

pub mod clock;
pub mod credentials;
pub mod error;
pub mod operation;
pub mod ratelimit;
pub mod result;
pub mod retry;
pub mod schema;
pub mod types;
pub mod upstream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialBundle, CredentialError, UserContext};
pub use error::{ErrorKind, FieldError, ToolError};
pub use operation::{NewTweet, Operation, Page, PollSpec, SortOrder, WORLDWIDE_WOEID};
pub use ratelimit::{
    BucketSnapshot, BucketState, Clearance, Observation, Quota, RateLimitGovernor,
    RateLimitHeaders,
};
pub use result::{ErrorBody, ToolResult};
pub use retry::RetryConfig;
pub use schema::{ArgValue, ArgumentSchema, Arguments, ParamKind, ParamSpec};
pub use types::*;
pub use upstream::{Upstream, UpstreamError, UpstreamReply};
