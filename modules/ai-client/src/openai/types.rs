use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `{"type": "json_object"}`; forces the model to emit a single JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

/// Token accounting from the completion, used for LLM cost tracking.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_with_usage() {
        let raw = r#"{
            "choices": [{"message": {"content": "{\"ok\": true}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("{\"ok\": true}")
        );
        assert_eq!(response.usage.unwrap().completion_tokens, 18);
    }

    #[test]
    fn chat_response_tolerates_missing_usage() {
        let raw = r#"{"choices": [{"message": {"content": null}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(response.usage.is_none());
        assert!(response.choices[0].message.content.is_none());
    }

    #[test]
    fn request_omits_unset_fields() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![WireMessage::system("s"), WireMessage::user("u")],
            temperature: None,
            response_format: Some(ResponseFormat::json_object()),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("temperature").is_none());
        assert_eq!(wire["response_format"]["type"], "json_object");
    }
}
