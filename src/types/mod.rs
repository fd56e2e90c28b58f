pub mod gemini;

pub use gemini::{Content, ErrorDetail, ErrorResponse, GenerateContentRequest, Part, PromptRequest};
