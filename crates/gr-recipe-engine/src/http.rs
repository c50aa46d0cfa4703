use std::time::Duration;

use gr_recipe_contracts::{RecipeError, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::Url;
use serde_json::Value;

/// Longest slice of a response body carried into an error message.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// The `detail` field of an error body. Strings are used as-is, any other
/// JSON value is rendered compactly. `None` when the body has no detail.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;
    match parsed.get("detail")? {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        other => Some(other.to_string()),
    }
}

/// Service base plus path segments. Each segment is percent-encoded, so
/// history dates and entry names that carry spaces or `#` stay intact.
pub fn endpoint(api_base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(api_base)
        .map_err(|err| RecipeError::Transport(format!("invalid api base '{api_base}': {err}")))?;
    url.path_segments_mut()
        .map_err(|_| RecipeError::Transport(format!("api base '{api_base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn transport_error(what: &str, url: &Url, err: reqwest::Error) -> RecipeError {
    RecipeError::Transport(truncate_text(
        &format!("{what} failed ({url}): {err}"),
        MAX_ERROR_BODY_CHARS,
    ))
}

/// Parse a success body as JSON. Non-success statuses come back as
/// `Transport` carrying the status code and the (truncated) detail.
pub(crate) fn response_json_or_error(what: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| RecipeError::Transport(format!("{what} response body read failed: {err}")))?;
    if !status.is_success() {
        let detail = error_detail(&body).unwrap_or(body);
        return Err(RecipeError::Transport(format!(
            "{what} failed ({code}): {}",
            truncate_text(&detail, MAX_ERROR_BODY_CHARS)
        )));
    }
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn get_json(http: &HttpClient, what: &str, url: Url, timeout: Duration) -> Result<Value> {
    let response = http
        .get(url.clone())
        .header("accept", "application/json")
        .timeout(timeout)
        .send()
        .map_err(|err| transport_error(what, &url, err))?;
    response_json_or_error(what, response)
}

/// `GET /` on the recipe service; returns the reported service name.
pub fn health(api_base: &str, timeout: Duration) -> Result<String> {
    let url = endpoint(api_base, &[])?;
    let payload = get_json(&HttpClient::new(), "health check", url, timeout)?;
    let status = payload.get("status").and_then(Value::as_str).unwrap_or("");
    if status != "ok" {
        return Err(RecipeError::Transport(format!(
            "health check reported status '{status}'"
        )));
    }
    Ok(payload
        .get("service")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_string_and_stringifies_others() {
        assert_eq!(
            error_detail(r#"{"detail": "OpenAI quota exceeded"}"#).as_deref(),
            Some("OpenAI quota exceeded")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body", "prompt"]}]}"#).as_deref(),
            Some(r#"[{"loc":["body","prompt"]}]"#)
        );
        assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
        assert_eq!(error_detail(r#"{"detail": null}"#), None);
        assert_eq!(error_detail("<html>502</html>"), None);
    }

    #[test]
    fn endpoint_encodes_each_segment() -> anyhow::Result<()> {
        let url = endpoint("http://localhost:8000", &["api", "history", "2026-03-04", "Neon Rain#2.json"])?;
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/history/2026-03-04/Neon%20Rain%232.json"
        );

        let nested = endpoint("http://example.test/recipes/", &["api", "generate"])?;
        assert_eq!(nested.as_str(), "http://example.test/recipes/api/generate");
        Ok(())
    }

    #[test]
    fn endpoint_rejects_unparseable_base() {
        assert!(matches!(
            endpoint("not a url", &["api"]),
            Err(RecipeError::Transport(_))
        ));
    }

    #[test]
    fn truncate_text_marks_cut_bodies() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
