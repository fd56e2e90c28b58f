use crate::config::ErrorShape;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frontend request payload - only the prompt is forwarded, unvalidated
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: Value,
}

impl PromptRequest {
    /// Take `prompt` from any JSON body. A body without one (including a
    /// non-object body) yields `null`. Returns `None` for a `null` body.
    pub fn from_body(body: Value) -> Option<Self> {
        let prompt = match body {
            Value::Null => return None,
            Value::Object(mut fields) => fields.remove("prompt").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Some(Self { prompt })
    }
}

/// Body of a `generateContent` call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// A text part. Whatever the frontend sent is forwarded for upstream to judge.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Part {
    pub text: Value,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: Value) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

/// Error body produced by the relay itself
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ErrorResponse {
    Detailed { error: ErrorDetail },
    Flat { error: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(shape: ErrorShape, message: impl Into<String>) -> Self {
        let message = message.into();
        match shape {
            ErrorShape::Nested => Self::Detailed {
                error: ErrorDetail { message },
            },
            ErrorShape::Flat => Self::Flat { error: message },
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Detailed { error } => &error.message,
            Self::Flat { error } => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_wraps_prompt() {
        let payload = GenerateContentRequest::from_prompt(json!("hello"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_missing_prompt_forwarded_as_null() {
        let request = PromptRequest::from_body(json!({"temperature": 0.2})).unwrap();
        assert_eq!(request.prompt, Value::Null);

        let payload = GenerateContentRequest::from_prompt(request.prompt);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"contents": [{"parts": [{"text": null}]}]})
        );
    }

    #[test]
    fn test_non_string_prompt_forwarded_unchanged() {
        let request = PromptRequest::from_body(json!({"prompt": 42})).unwrap();
        assert_eq!(
            serde_json::to_value(GenerateContentRequest::from_prompt(request.prompt)).unwrap(),
            json!({"contents": [{"parts": [{"text": 42}]}]})
        );

        let request = PromptRequest::from_body(json!({"prompt": {"nested": [1, 2]}})).unwrap();
        assert_eq!(request.prompt, json!({"nested": [1, 2]}));
    }

    #[test]
    fn test_non_object_bodies() {
        for body in [json!("hello"), json!([1, 2]), json!(7), json!(true)] {
            let request = PromptRequest::from_body(body).unwrap();
            assert_eq!(request.prompt, Value::Null);
        }
        assert!(PromptRequest::from_body(Value::Null).is_none());
    }

    #[test]
    fn test_error_shapes() {
        let nested = ErrorResponse::new(ErrorShape::Nested, "boom");
        assert_eq!(
            serde_json::to_value(&nested).unwrap(),
            json!({"error": {"message": "boom"}})
        );
        assert_eq!(nested.message(), "boom");

        let flat = ErrorResponse::new(ErrorShape::Flat, "boom");
        assert_eq!(serde_json::to_value(&flat).unwrap(), json!({"error": "boom"}));
        assert_eq!(flat.message(), "boom");
    }

    #[test]
    fn test_error_response_parses_either_shape() {
        let nested: ErrorResponse =
            serde_json::from_str(r#"{"error": {"message": "API key invalid"}}"#).unwrap();
        assert_eq!(nested.message(), "API key invalid");

        let flat: ErrorResponse = serde_json::from_str(r#"{"error": "missing"}"#).unwrap();
        assert_eq!(flat.message(), "missing");
    }
}
