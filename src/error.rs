use reqwest::StatusCode;

#[derive(Debug, serde::Deserialize)]
pub(crate) struct RentmanErrorResponse {
    #[serde(default, alias = "errorMessage")]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) code: Option<serde_json::Value>,
}

/// Builds the log line for a failed request.
///
/// Failures never propagate to the caller, so this text is the only place
/// the server's explanation surfaces.
pub(crate) fn describe_failure(status: StatusCode, url: &str, body: &str) -> String {
    let parsed = serde_json::from_str::<RentmanErrorResponse>(body).ok();
    let server_message = parsed
        .as_ref()
        .and_then(|e| e.message.as_deref().or(e.error.as_deref()))
        .unwrap_or("");
    let code = parsed
        .as_ref()
        .and_then(|e| e.code.as_ref())
        .map(|c| format!(" (code {})", c))
        .unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return format!(
            "Rentman authentication failed (HTTP {}) for {}: check RENTMAN_API_KEY is a valid API token{}{}",
            status.as_u16(),
            url,
            if server_message.is_empty() { "" } else { ": " },
            server_message
        );
    }

    if status == StatusCode::PAYLOAD_TOO_LARGE || status == StatusCode::URI_TOO_LONG {
        return format!(
            "Rentman rejected the request size (HTTP {}) for {}: use a smaller batch size",
            status.as_u16(),
            url
        );
    }

    if !server_message.is_empty() {
        return format!(
            "HTTP {} for {}: {}{}",
            status.as_u16(),
            url,
            server_message,
            code
        );
    }

    format!("HTTP {} for {}: {}", status.as_u16(), url, body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_error_message_field() {
        let msg = describe_failure(
            StatusCode::BAD_REQUEST,
            "https://api/x",
            r#"{"errorMessage":"unknown field","code":400}"#,
        );
        assert_eq!(msg, "HTTP 400 for https://api/x: unknown field (code 400)");
    }

    #[test]
    fn falls_back_to_raw_body() {
        let msg = describe_failure(StatusCode::BAD_GATEWAY, "https://api/x", "upstream down\n");
        assert_eq!(msg, "HTTP 502 for https://api/x: upstream down");
    }

    #[test]
    fn auth_failures_mention_token() {
        let msg = describe_failure(StatusCode::UNAUTHORIZED, "https://api/x", "");
        assert!(msg.contains("RENTMAN_API_KEY"));
        assert!(msg.contains("HTTP 401"));
    }
}
