pub mod error;
pub mod openai;

pub use error::{AiError, Result};
pub use openai::{Completion, OpenAi, Usage};
