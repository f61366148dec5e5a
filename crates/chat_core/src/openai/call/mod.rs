pub mod dispatcher;
pub mod request;
pub mod resolver;
pub mod types;

pub use dispatcher::{ToolDispatcher, IMAGE_FALLBACK, WEBSITE_FALLBACK};
pub use request::{build_chat_request, parse_first_choice};
pub use resolver::resolve_tool_call;
pub use types::{
    CompletionChoice, DispatchState, GenerateImageArgs, ReadWebsiteArgs, ToolCall, ToolInvocationRequest,
    ToolResolution, ToolResult,
};
