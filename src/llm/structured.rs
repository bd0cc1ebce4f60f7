//! Typed structured requests
//!
//! Response types derive [`schemars::JsonSchema`]; the schema sent to the
//! assistant is generated from the type the caller expects back, so the two
//! cannot drift apart.

use crate::llm::client::Assistant;
use crate::types::{AppError, Result};
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Build a self-contained JSON schema for `T`
///
/// Subschemas are inlined and the `$schema`/`title` annotations are removed,
/// since provider schema dialects reject or ignore them.
pub fn schema_for<T: JsonSchema>() -> Result<Value> {
    let schema = SchemaSettings::draft2020_12()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator()
        .into_root_schema_for::<T>();

    let mut value = serde_json::to_value(&schema)
        .map_err(|e| AppError::Internal(format!("failed to serialize schema: {}", e)))?;

    if let Some(object) = value.as_object_mut() {
        object.remove("title");
        object.remove("$defs");
        object.remove("$schema");
    }

    Ok(value)
}

/// Ask for a structured answer and decode it into `T`
///
/// A response that does not decode into `T` is reported as
/// [`AppError::SchemaParse`].
pub async fn ask_for<T>(assistant: &dyn Assistant, persona: &str, request: &str) -> Result<T>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = schema_for::<T>()?;
    let value = assistant.structured_ask(persona, request, &schema).await?;

    serde_json::from_value(value).map_err(|e| {
        AppError::SchemaParse(format!(
            "response does not match {}: {}",
            T::schema_name(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Outline {
        goal: String,
        entries: Vec<Entry>,
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Entry {
        name: String,
    }

    #[test]
    fn test_schema_is_inlined() {
        let schema = schema_for::<Outline>().unwrap();

        assert_eq!(schema["type"], "object");
        assert!(schema.get("title").is_none());
        assert!(schema.get("$defs").is_none());
        assert!(schema.get("$schema").is_none());
        assert_eq!(
            schema["properties"]["entries"]["items"]["properties"]["name"]["type"],
            "string"
        );
    }

    #[test]
    fn test_schema_for_list_of_strings() {
        let schema = schema_for::<Vec<String>>().unwrap();
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["items"]["type"], "string");
    }
}
