use serde::de::DeserializeOwned;

use crate::openai::tools::{ToolCatalogue, GENERATE_IMAGE, READ_WEBSITE_CONTENT};

use super::types::{GenerateImageArgs, ReadWebsiteArgs, ToolCall, ToolInvocationRequest, ToolResolution};

/// Resolve the proposed tool call against the catalogue and parse its arguments once.
/// Argument JSON comes from the model and is not trusted.
pub fn resolve_tool_call(request: &ToolInvocationRequest, catalogue: &ToolCatalogue) -> ToolResolution {
    if catalogue.find(&request.name).is_none() {
        return ToolResolution::ToolNotFound { requested: request.name.clone() };
    }
    match request.name.as_str() {
        READ_WEBSITE_CONTENT => match parse_args::<ReadWebsiteArgs>(request) {
            Ok(args) => ToolResolution::Resolved(ToolCall::ReadWebsite(args)),
            Err(e) => e,
        },
        GENERATE_IMAGE => match parse_args::<GenerateImageArgs>(request) {
            Ok(args) => ToolResolution::Resolved(ToolCall::GenerateImage(args)),
            Err(e) => e,
        },
        // カタログにあっても実装が無いものは未知扱い
        _ => ToolResolution::ToolNotFound { requested: request.name.clone() },
    }
}

fn parse_args<T: DeserializeOwned>(request: &ToolInvocationRequest) -> Result<T, ToolResolution> {
    serde_json::from_str(&request.arguments).map_err(|e| ToolResolution::ArgumentsParseError {
        name: request.name.clone(),
        raw: request.arguments.clone(),
        error: e.to_string(),
    })
}
