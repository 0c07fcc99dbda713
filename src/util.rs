pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

pub(crate) fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    // Endpoints arrive with caller-written filters such as `planperiod_start[gte]=...`,
    // so existing query text is passed through untouched.
    let mut out = url.to_string();
    if params.is_empty() {
        return out;
    }
    if !url.contains('?') {
        out.push('?');
    } else if !url.ends_with('?') && !url.ends_with('&') {
        out.push('&');
    }
    let mut first = true;
    for (k, v) in params {
        if !first {
            out.push('&');
        }
        first = false;
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

/// Renders a scalar cell as the string the API would accept back in a path or filter.
pub(crate) fn value_to_plain_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urljoin_handles_slashes() {
        assert_eq!(
            urljoin("https://api.rentman.net/", "/contacts"),
            "https://api.rentman.net/contacts"
        );
        assert_eq!(
            urljoin("https://api.rentman.net", "projects/12"),
            "https://api.rentman.net/projects/12"
        );
        assert_eq!(
            urljoin("https://api.rentman.net", "https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn append_query_respects_existing_filters() {
        assert_eq!(
            append_query("https://h/crew", &[("offset", "0"), ("limit", "50")]),
            "https://h/crew?offset=0&limit=50"
        );
        assert_eq!(
            append_query(
                "https://h/projects?number=7&fields=id,number",
                &[("offset", "50"), ("limit", "50")]
            ),
            "https://h/projects?number=7&fields=id,number&offset=50&limit=50"
        );
        assert_eq!(
            append_query("https://h/costs?", &[("offset", "0")]),
            "https://h/costs?offset=0"
        );
    }

    #[test]
    fn plain_strings() {
        assert_eq!(value_to_plain_string(&json!(12)), Some("12".to_string()));
        assert_eq!(value_to_plain_string(&json!("P-1")), Some("P-1".to_string()));
        assert_eq!(value_to_plain_string(&json!(null)), None);
    }
}
