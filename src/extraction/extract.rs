//! Structured field extraction.

use super::{ExtractionError, render_template};
use crate::api::{AskAsync, ChatPrompt, ask_with_backoff};
use crate::config::{ColumnSpec, DataType, PromptTemplate};
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Raw model values per column, before validation.
pub type RawFields = BTreeMap<String, Option<String>>;

fn example_value(data_type: DataType) -> Value {
    match data_type {
        DataType::Integer => Value::from(45),
        DataType::Float => Value::from(37.5),
        DataType::Boolean => Value::from(1),
        DataType::Date => Value::from("15/03/2024"),
        DataType::Time => Value::from("14:30"),
        DataType::Multiclass | DataType::Text => Value::from("ตัวอย่าง"),
    }
}

/// `(fields_description, example_json)` for the extraction prompt.
pub fn build_field_guide(columns: &[&ColumnSpec]) -> (String, String) {
    let description = columns
        .iter()
        .filter_map(|c| c.extraction_hint.as_deref())
        .map(|hint| format!("- {hint}"))
        .collect::<Vec<_>>()
        .join("\n");
    let example: Map<String, Value> = columns
        .iter()
        .map(|c| (c.name.clone(), example_value(c.data_type)))
        .collect();
    let example_json =
        serde_json::to_string_pretty(&Value::Object(example)).unwrap_or_else(|_| "{}".to_string());
    (description, example_json)
}

/// Parse a JSON reply, tolerating code fences and surrounding prose.
pub fn parse_json_reply(text: &str) -> Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```") {
        // drop the optional language tag on the fence line
        let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
        rest.trim_end().trim_end_matches("```").trim()
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            (Some(start), _) => &trimmed[start..],
            _ => trimmed,
        }
    };
    serde_json::from_str(body)
}

fn cell_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn fields_from(value: Value, columns: &[&ColumnSpec]) -> Result<RawFields, ExtractionError> {
    let Value::Object(map) = value else {
        return Err(ExtractionError::NotAnObject);
    };
    Ok(columns
        .iter()
        .map(|c| (c.name.clone(), map.get(&c.name).and_then(cell_of)))
        .collect())
}

/// Ask the model for every column in `columns`.
///
/// A reply cut off mid-JSON is re-asked once.
pub async fn extract<C: AskAsync>(
    client: &C,
    template: &PromptTemplate,
    columns: &[&ColumnSpec],
    content: &str,
    max_content_chars: usize,
) -> Result<RawFields, ExtractionError> {
    let (fields_description, example_json) = build_field_guide(columns);
    let content = truncate_chars(content, max_content_chars);
    let prompt = ChatPrompt {
        system: template.system_message.clone(),
        user: render_template(
            &template.user_template,
            &[
                ("content", content.as_str()),
                ("fields_description", fields_description.as_str()),
                ("example_json", example_json.as_str()),
            ],
        ),
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        let reply = ask_with_backoff(client, &prompt).await?;
        match parse_json_reply(&reply) {
            Ok(value) => {
                debug!(attempt, "Extraction reply parsed");
                return fields_from(value, columns);
            }
            Err(e) if looks_truncated(&e) && attempt == 1 => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&reply, 300),
                    "Reply looks truncated; asking again"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&reply, 300),
                    "Model returned non-conforming JSON"
                );
                return Err(e.into());
            }
        }
    }
}
