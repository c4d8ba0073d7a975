//! LLM classification and field extraction.
//!
//! # Architecture
//!
//! - [`classify`]: relevance decision for one article
//! - [`extract`]: structured fields for one relevant article
//! - [`engine`]: the stage itself, from prepare ledger to filled/heat/base files

pub mod classify;
pub mod engine;
pub mod extract;

use crate::api::LlmError;
use thiserror::Error;

pub use classify::classify;
pub use engine::run_extraction;
pub use extract::{build_field_guide, extract, parse_json_reply};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model reply is not a JSON object")]
    NotAnObject,
}

/// Fill `{name}` placeholders in a prompt template.
///
/// Single pass over the template: placeholder text inside a substituted value
/// (article text quoting `{fields_description}`, say) is left as it is.
pub(crate) fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail[1..]
            .find('}')
            .map(|close| &tail[1..=close])
            .and_then(|name| values.iter().find(|(n, _)| *n == name).map(|(n, v)| (n.len(), *v)));
        match value {
            Some((name_len, value)) => {
                out.push_str(value);
                rest = &tail[name_len + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted stand-in for the model.

    use crate::api::{AskAsync, ChatPrompt, LlmError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies chosen by a closure over the user prompt.
    pub struct FakeModel<F> {
        pub reply: F,
        pub prompts: Mutex<Vec<ChatPrompt>>,
    }

    impl<F> FakeModel<F>
    where
        F: Fn(&str) -> Result<String, LlmError>,
    {
        pub fn new(reply: F) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl<F> AskAsync for FakeModel<F>
    where
        F: Fn(&str) -> Result<String, LlmError>,
    {
        async fn ask(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            (self.reply)(&prompt.user)
        }
    }

    /// Replies taken in order from a queue.
    pub struct QueueModel {
        pub replies: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    impl QueueModel {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl AskAsync for QueueModel {
        async fn ask(&self, _prompt: &ChatPrompt) -> Result<String, LlmError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let out = render_template(
            "{fields_description}\n{content}\n{content}",
            &[("content", "ข่าว"), ("fields_description", "- a")],
        );
        assert_eq!(out, "- a\nข่าว\nข่าว");
    }

    #[test]
    fn test_render_template_does_not_expand_values() {
        let out = render_template(
            "ข่าว: {content}\nฟิลด์: {fields_description}\nตัวอย่าง: {\"a\": 1} {unknown}",
            &[
                ("content", "อ้างถึง {fields_description} และ {content}"),
                ("fields_description", "- death_count"),
            ],
        );
        assert_eq!(
            out,
            "ข่าว: อ้างถึง {fields_description} และ {content}\nฟิลด์: - death_count\nตัวอย่าง: {\"a\": 1} {unknown}"
        );
    }
}
