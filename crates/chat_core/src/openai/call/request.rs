use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionResponseMessage, ChatCompletionTool, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse,
};
use tracing::debug;

use crate::config::OpenAIConfig;
use crate::error::DispatchError;
use crate::openai::tools::ToolDeclaration;
use crate::openai::ConversationHistory;

use super::types::{CompletionChoice, ToolInvocationRequest};

/// 会話履歴とツール宣言からChatCompletionリクエストを構築する
///
/// # Arguments
/// * `history` - 会話履歴
/// * `tools` - 宣言するツール（空ならリクエストに `tools` を含めない）
/// * `config` - OpenAI設定
///
/// # Returns
/// 構築されたChatCompletionリクエスト（候補は常に1件）
pub fn build_chat_request(
    history: ConversationHistory,
    tools: &[ToolDeclaration],
    config: &OpenAIConfig,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let mut builder = CreateChatCompletionRequestArgs::default();
    builder.model(&config.model).messages(history.into_vec()).n(1);

    // 空配列の tools は API 側で弾かれるので、宣言なしのときはフィールドごと省く
    if !tools.is_empty() {
        let tools_for_api: Vec<ChatCompletionTool> = tools.iter().map(|t| t.as_chat_tool()).collect();
        builder.tools(tools_for_api);
    }

    let req = builder.build()?;
    debug!(target: "openai", model = %config.model, tools = tools.len(), "ChatCompletionリクエストを構築しました");
    Ok(req)
}

/// レスポンスの先頭候補を取り出す。
/// ツール呼び出しは `tool_calls` の先頭、なければ旧形式の `function_call` を見る。
/// テキストもツール呼び出しも無い場合は `NoCompletion`。
pub fn parse_first_choice(resp: CreateChatCompletionResponse) -> Result<CompletionChoice, DispatchError> {
    debug!(target: "openai", choices = resp.choices.len(), "chat_completion_response");
    let choice = resp.choices.into_iter().next().ok_or(DispatchError::NoCompletion)?;
    let message = choice.message;

    let tool_call = message
        .tool_calls
        .as_ref()
        .and_then(|calls| calls.first())
        .map(|c| ToolInvocationRequest {
            name: c.function.name.clone(),
            arguments: c.function.arguments.clone(),
        })
        .or_else(|| legacy_function_call(&message));

    if message.content.is_none() && tool_call.is_none() {
        return Err(DispatchError::NoCompletion);
    }
    Ok(CompletionChoice { content: message.content, tool_call })
}

#[allow(deprecated)]
fn legacy_function_call(message: &ChatCompletionResponseMessage) -> Option<ToolInvocationRequest> {
    message.function_call.as_ref().map(|f| ToolInvocationRequest {
        name: f.name.clone(),
        arguments: f.arguments.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ConversationMessage;
    use crate::openai::tools::ToolCatalogue;
    use serde_json::json;

    fn history() -> ConversationHistory {
        ConversationHistory::from_messages(&[ConversationMessage::user("hello")]).unwrap()
    }

    fn response(message: serde_json::Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4-1106-preview",
            "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
        }))
        .unwrap()
    }

    #[test]
    fn request_declares_tools_and_single_candidate() {
        let req = build_chat_request(history(), ToolCatalogue::standard().as_slice(), &OpenAIConfig::default()).unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "gpt-4-1106-preview");
        assert_eq!(v["n"], 1);
        assert_eq!(v["tools"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(v["tools"][0]["function"]["name"], "read_website_content");
    }

    #[test]
    fn request_without_tools_omits_field() {
        let req = build_chat_request(history(), &[], &OpenAIConfig::default()).unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("tools").is_none());
    }

    #[test]
    fn text_choice_is_parsed() {
        let choice = parse_first_choice(response(json!({"role": "assistant", "content": "hi there"}))).unwrap();
        assert_eq!(choice, CompletionChoice::text("hi there"));
    }

    #[test]
    fn tool_call_choice_is_parsed() {
        let choice = parse_first_choice(response(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "generate_image", "arguments": "{\"prompt\":\"cat\"}" }
            }]
        })))
        .unwrap();
        assert_eq!(choice, CompletionChoice::tool_call("generate_image", "{\"prompt\":\"cat\"}"));
    }

    #[test]
    fn legacy_function_call_is_parsed() {
        let choice = parse_first_choice(response(json!({
            "role": "assistant",
            "content": null,
            "function_call": { "name": "read_website_content", "arguments": "{\"url\":\"https://a.b\"}" }
        })))
        .unwrap();
        assert_eq!(choice.tool_call.map(|c| c.name).as_deref(), Some("read_website_content"));
    }

    #[test]
    fn empty_message_is_no_completion() {
        let err = parse_first_choice(response(json!({"role": "assistant", "content": null}))).unwrap_err();
        assert!(matches!(err, DispatchError::NoCompletion));
    }

    #[test]
    fn no_choices_is_no_completion() {
        let resp: CreateChatCompletionResponse = serde_json::from_value(json!({
            "id": "x", "object": "chat.completion", "created": 1, "model": "m", "choices": []
        }))
        .unwrap();
        assert!(matches!(parse_first_choice(resp), Err(DispatchError::NoCompletion)));
    }
}
