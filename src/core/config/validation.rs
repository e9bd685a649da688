use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(search) = expect_optional_object(root, "search")? {
        validate_u64_field(search, "search.max_chars", "max_chars", 100, 1_000_000)?;
        validate_u64_field(search, "search.timeout_secs", "timeout_secs", 1, 600)?;
        validate_optional_string_field(
            search,
            "search.google_search_api_key",
            "google_search_api_key",
        )?;
        validate_optional_string_field(
            search,
            "search.google_search_engine_id",
            "google_search_engine_id",
        )?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_bool_field(rag, "rag.enabled", "enabled")?;
        validate_optional_string_field(rag, "rag.corpus_dir", "corpus_dir")?;
        validate_optional_string_field(rag, "rag.index_path", "index_path")?;
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 50, 100_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 10_000)?;
        validate_u64_field(rag, "rag.top_k", "top_k", 1, 100)?;

        let size = rag.get("chunk_size").and_then(Value::as_u64).unwrap_or(500);
        let overlap = rag.get("chunk_overlap").and_then(Value::as_u64).unwrap_or(50);
        if overlap >= size {
            return Err(ApiError::BadRequest(
                "Invalid config at 'rag.chunk_overlap': must be smaller than chunk_size"
                    .to_string(),
            ));
        }
    }

    if let Some(report) = expect_optional_object(root, "report")? {
        validate_optional_string_field(report, "report.endpoint", "endpoint")?;
        validate_optional_string_field(report, "report.output_dir", "output_dir")?;
        validate_u64_field(report, "report.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(pipeline) = expect_optional_object(root, "pipeline")? {
        validate_u64_field(pipeline, "pipeline.default_count", "default_count", 1, 50)?;
        validate_u64_field(pipeline, "pipeline.max_count", "max_count", 1, 50)?;
        validate_u64_field(
            pipeline,
            "pipeline.recursion_limit",
            "recursion_limit",
            1,
            10_000,
        )?;
        validate_enum_field(
            pipeline,
            "pipeline.discovery",
            "discovery",
            &["fixed", "dynamic"],
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65535)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "llm": { "model": "gpt-4o-mini", "timeout_secs": 30 },
            "search": { "max_chars": 2000 },
            "rag": { "chunk_size": 500, "chunk_overlap": 50, "top_k": 5 },
            "pipeline": { "default_count": 3, "discovery": "dynamic", "max_count": 5 },
            "server": { "port": 8080 }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_wrong_types_and_ranges() {
        assert!(validate_config(&json!({ "llm": "nope" })).is_err());
        assert!(validate_config(&json!({ "llm": { "timeout_secs": "60" } })).is_err());
        assert!(validate_config(&json!({ "pipeline": { "default_count": 0 } })).is_err());
        assert!(validate_config(&json!({ "server": { "port": 70000 } })).is_err());
    }

    #[test]
    fn rejects_unknown_discovery_mode() {
        let err = validate_config(&json!({ "pipeline": { "discovery": "random" } })).unwrap_err();
        assert!(err.to_string().contains("fixed, dynamic"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        assert!(validate_config(&json!({
            "rag": { "chunk_size": 100, "chunk_overlap": 100 }
        }))
        .is_err());
    }
}
