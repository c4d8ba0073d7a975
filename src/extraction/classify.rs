//! Relevance classification.

use super::{extract::parse_json_reply, render_template};
use crate::api::{AskAsync, ChatPrompt, ask_with_backoff};
use crate::config::PromptTemplate;
use crate::models::{Classification, ClassificationMethod};
use crate::utils::{truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Content with fewer non-whitespace characters is never sent to the model.
pub const MIN_CLASSIFIABLE_CHARS: usize = 10;

static CONFIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)confidence\s*[:=]\s*([0-9]*\.?[0-9]+)").expect("valid regex")
});

fn json_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f >= 0.5),
        Value::String(s) => match s.trim() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read `(is_relevant, confidence)` out of a model reply.
///
/// A JSON object with `is_relevant` (and optionally `confidence`) is honoured;
/// otherwise the first `0` or `1` in the reply decides, with an optional
/// `confidence: <float>` anywhere in the text.
pub fn parse_classification(reply: &str) -> Option<(bool, f64)> {
    if let Ok(Value::Object(map)) = parse_json_reply(reply) {
        if let Some(flag) = map.get("is_relevant").and_then(json_flag) {
            let confidence = map
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            return Some((flag, confidence.clamp(0.0, 1.0)));
        }
    }

    let confidence = CONFIDENCE_RE
        .captures(reply)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|c| c.clamp(0.0, 1.0));
    let without_confidence = CONFIDENCE_RE.replace_all(reply, "");
    let digit = without_confidence.chars().find(|c| *c == '0' || *c == '1')?;
    Some((digit == '1', confidence.unwrap_or(1.0)))
}

/// Decide whether an article is relevant.
///
/// Never fails: transport errors and unparseable replies classify as
/// irrelevant with a method tag that says why.
pub async fn classify<C: AskAsync>(
    client: &C,
    template: &PromptTemplate,
    content: &str,
    max_content_chars: usize,
) -> Classification {
    let significant = content.chars().filter(|c| !c.is_whitespace()).count();
    if significant < MIN_CLASSIFIABLE_CHARS {
        return Classification::irrelevant(ClassificationMethod::SkippedEmpty);
    }

    let content = truncate_chars(content, max_content_chars);
    let prompt = ChatPrompt {
        system: template.system_message.clone(),
        user: render_template(&template.user_template, &[("content", content.as_str())]),
    };
    let reply = match ask_with_backoff(client, &prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Classification request failed");
            return Classification::irrelevant(ClassificationMethod::LlmError);
        }
    };
    match parse_classification(&reply) {
        Some((is_relevant, confidence)) => {
            debug!(is_relevant, confidence, "Classified");
            Classification {
                is_relevant,
                confidence,
                method: ClassificationMethod::Llm,
            }
        }
        None => {
            warn!(reply = %truncate_for_log(&reply, 200), "Unparseable classification reply");
            Classification::irrelevant(ClassificationMethod::LlmUnparsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LlmError;
    use crate::config::Prompts;
    use crate::extraction::testing::FakeModel;

    const ARTICLE: &str = "ชายวัย 60 ปีเสียชีวิตจากโรคลมแดดขณะทำงานกลางแจ้งที่จังหวัดขอนแก่น";

    #[test]
    fn test_parse_classification() {
        assert_eq!(parse_classification("1"), Some((true, 1.0)));
        assert_eq!(parse_classification("คำตอบ: 0"), Some((false, 1.0)));
        assert_eq!(parse_classification("1\nconfidence: 0.8"), Some((true, 0.8)));
        assert_eq!(parse_classification("Confidence = 0.9, answer 0"), Some((false, 0.9)));
        assert_eq!(
            parse_classification(r#"```json
{"is_relevant": 1, "confidence": 0.75}
```"#),
            Some((true, 0.75))
        );
        assert_eq!(parse_classification(r#"{"is_relevant": false}"#), Some((false, 1.0)));
        assert_eq!(parse_classification("ไม่แน่ใจ"), None);
    }

    #[tokio::test]
    async fn test_short_content_is_not_sent() {
        let model = FakeModel::new(|_| Ok("1".to_string()));
        let prompts = Prompts::default();
        let got = classify(&model, &prompts.classification, "  สั้น  ", 6000).await;
        assert_eq!(got, Classification::irrelevant(ClassificationMethod::SkippedEmpty));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_relevant_reply() {
        let model = FakeModel::new(|_| Ok(" 1 ".to_string()));
        let prompts = Prompts::default();
        let got = classify(&model, &prompts.classification, ARTICLE, 6000).await;
        assert!(got.is_relevant);
        assert_eq!(got.method, ClassificationMethod::Llm);
        let sent = model.prompts.lock().unwrap()[0].clone();
        assert!(sent.user.contains(ARTICLE));
        assert_eq!(sent.system, prompts.classification.system_message);
    }

    #[tokio::test]
    async fn test_content_is_truncated() {
        let model = FakeModel::new(|_| Ok("0".to_string()));
        let prompts = Prompts::default();
        let long = "ร".repeat(100);
        classify(&model, &prompts.classification, &long, 20).await;
        let sent = model.prompts.lock().unwrap()[0].user.clone();
        assert!(sent.contains(&"ร".repeat(20)));
        assert!(!sent.contains(&"ร".repeat(21)));
    }

    #[tokio::test]
    async fn test_failures_are_irrelevant() {
        let prompts = Prompts::default();
        let broken = FakeModel::new(|_| Err(LlmError::EmptyResponse));
        let got = classify(&broken, &prompts.classification, ARTICLE, 6000).await;
        assert_eq!(got.method, ClassificationMethod::LlmError);
        assert!(!got.is_relevant);

        let rambling = FakeModel::new(|_| Ok("ไม่สามารถตอบได้".to_string()));
        let got = classify(&rambling, &prompts.classification, ARTICLE, 6000).await;
        assert_eq!(got.method, ClassificationMethod::LlmUnparsed);
        assert_eq!(got.confidence, 0.0);
    }
}
