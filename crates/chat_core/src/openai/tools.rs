//! モデルに宣言するツールの定義
//!
//! 実行処理はディスパッチャ側に固定で持つので、ここではメタデータ
//! (名前・説明・JSON Schema) だけを扱う。

use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde_json::{json, Map, Value};

pub const READ_WEBSITE_CONTENT: &str = "read_website_content";
pub const GENERATE_IMAGE: &str = "generate_image";

/// ツール引数の JSON Schema
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameters(Value);

impl ToolParameters {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// `type: object` のスキーマを組み立てるビルダー
#[derive(Debug, Default)]
pub struct ToolParametersBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolParametersBuilder {
    pub fn new_object() -> Self {
        Self::default()
    }

    pub fn add_string(mut self, name: &str, description: Option<&str>) -> Self {
        let mut prop = json!({ "type": "string" });
        if let Some(d) = description {
            prop["description"] = json!(d);
        }
        self.properties.insert(name.to_string(), prop);
        self
    }

    /// デフォルト値付きの文字列プロパティ
    pub fn add_string_with_default(mut self, name: &str, description: Option<&str>, default: &str) -> Self {
        self = self.add_string(name, description);
        if let Some(prop) = self.properties.get_mut(name) {
            prop["default"] = json!(default);
        }
        self
    }

    pub fn required(mut self, name: &str) -> Self {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters(json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        }))
    }
}

/// OpenAI function calling に渡すツール宣言
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: ToolParameters,
}

impl ToolDeclaration {
    pub fn new(name: &'static str, description: &'static str, parameters: ToolParameters) -> Self {
        Self { name, description, parameters }
    }

    /// OpenAI SDK の `FunctionObject` に変換
    pub fn function_object(&self) -> FunctionObject {
        FunctionObject {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            parameters: Some(self.parameters.as_value().clone()),
            strict: None,
        }
    }

    /// ChatCompletionTool 形式（APIへ渡す vector 用）
    pub fn as_chat_tool(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: self.function_object(),
        }
    }
}

pub fn build_read_website_tool() -> ToolDeclaration {
    let parameters = ToolParametersBuilder::new_object()
        .add_string("url", Some("The URL to the website to read "))
        .required("url")
        .build();
    ToolDeclaration::new(READ_WEBSITE_CONTENT, "Read the content on a given website", parameters)
}

pub fn build_generate_image_tool() -> ToolDeclaration {
    let parameters = ToolParametersBuilder::new_object()
        .add_string("prompt", Some("The prompt to generate an image from"))
        .add_string_with_default("size", Some("The size of the image, default is '512x512'"), "512x512")
        .required("prompt")
        .build();
    ToolDeclaration::new(GENERATE_IMAGE, "Generate an image based on a prompt", parameters)
}

/// プロセス全体で共有する固定のツール一覧。起動時に一度だけ作る。
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalogue {
    tools: Vec<ToolDeclaration>,
}

impl ToolCatalogue {
    /// read_website_content と generate_image の2つ
    pub fn standard() -> Self {
        Self { tools: vec![build_read_website_tool(), build_generate_image_tool()] }
    }

    pub fn as_slice(&self) -> &[ToolDeclaration] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.iter().find(|t| t.name == name)
    }
}

impl Default for ToolCatalogue {
    fn default() -> Self {
        Self::standard()
    }
}
