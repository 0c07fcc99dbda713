use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
    debug: Option<bool>,
}

pub(crate) fn load_config(
    url: Option<String>,
    key: Option<String>,
    debug: Option<bool>,
) -> Result<ClientConfig> {
    // A missing .env file is the normal case outside development checkouts.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("ignoring unreadable .env file: {}", e);
        }
    }

    resolve_config(url, key, debug, |name| std::env::var(name).ok())
}

fn resolve_config<E>(
    url: Option<String>,
    key: Option<String>,
    debug: Option<bool>,
    var: E,
) -> Result<ClientConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let env = |name: &str| {
        var(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut url = url.or_else(|| env("RENTMAN_URL"));
    let mut key = key.or_else(|| env("RENTMAN_API_KEY"));
    let env_debug = env("RENTMAN_DEBUG").map(|v| parse_flag(&v));

    let rc_candidates = rc_candidates(env("RENTMAN_RC"));
    let mut file_debug: Option<bool> = None;

    if url.is_none() || key.is_none() || (debug.is_none() && env_debug.is_none()) {
        for rc_path in &rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;

                if url.is_none() {
                    url = cfg.url;
                }
                if key.is_none() {
                    key = cfg.key;
                }
                file_debug = cfg.debug;
                break;
            }
        }
    }

    let url = match url {
        Some(v) => v,
        None => bail!(
            "Missing configuration: url (set RENTMAN_URL, add it to .env, or put `url:` in one of: {})",
            describe_candidates(&rc_candidates)
        ),
    };

    let key = match key {
        Some(v) => v,
        None => bail!(
            "Missing configuration: key (set RENTMAN_API_KEY, add it to .env, or put `key:` in one of: {})",
            describe_candidates(&rc_candidates)
        ),
    };

    let debug = debug.or(env_debug).or(file_debug).unwrap_or(false);

    Ok(ClientConfig {
        debug,
        ..ClientConfig::new(url, key)
    })
}

fn parse_flag(v: &str) -> bool {
    !matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn describe_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return ".rentmanrc".to_string();
    }
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // Long tokens are often wrapped: `key:` on one line, the token on the next.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                let v = strip_quotes(line);
                match pk {
                    "url" => cfg.url = Some(v.to_string()),
                    "key" => cfg.key = Some(v.to_string()),
                    _ => {}
                }
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let v = strip_quotes(v.trim());
            match k.trim() {
                "url" => {
                    if v.is_empty() {
                        pending_key = Some("url");
                    } else {
                        cfg.url = Some(v.to_string());
                    }
                }
                "key" => {
                    if v.is_empty() {
                        pending_key = Some("key");
                    } else {
                        cfg.key = Some(v.to_string());
                    }
                }
                "debug" => {
                    if !v.is_empty() {
                        cfg.debug = Some(parse_flag(v));
                    }
                }
                _ => {}
            }
        }
    }

    cfg
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(explicit: Option<String>) -> Vec<PathBuf> {
    // 1) RENTMAN_RC (explicit)
    // 2) ./.rentmanrc
    // 3) ~/.rentmanrc
    if let Some(p) = explicit {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".rentmanrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".rentmanrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn parses_single_line_values() {
        let cfg = parse_rc(
            "# rentman credentials\nurl: https://api.rentman.net\nkey: 'abc.def'\ndebug: yes\n",
        );
        assert_eq!(
            cfg,
            RcConfig {
                url: Some("https://api.rentman.net".to_string()),
                key: Some("abc.def".to_string()),
                debug: Some(true),
            }
        );
    }

    #[test]
    fn parses_wrapped_token() {
        let cfg = parse_rc("url: https://api.rentman.net\nkey:\n  \"eyJ0eXAiOiJKV1Qi\"\n");
        assert_eq!(cfg.key.as_deref(), Some("eyJ0eXAiOiJKV1Qi"));
        assert_eq!(cfg.url.as_deref(), Some("https://api.rentman.net"));
        assert_eq!(cfg.debug, None);
    }

    #[test]
    fn reads_rc_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".rentmanrc");
        std::fs::write(&path, "url: https://example.test\nkey: t0k\ndebug: 0\n").unwrap();

        let cfg = read_rc(&path).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("https://example.test"));
        assert_eq!(cfg.key.as_deref(), Some("t0k"));
        assert_eq!(cfg.debug, Some(false));
    }

    #[test]
    fn explicit_arguments_win() {
        let cfg = load_config(
            Some("https://explicit.test".to_string()),
            Some("explicit-token".to_string()),
            Some(true),
        )
        .unwrap();
        assert_eq!(cfg.url, "https://explicit.test");
        assert_eq!(cfg.key, "explicit-token");
        assert!(cfg.debug);
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn write_rc(dir: &Path, text: &str) -> String {
        let path = dir.join("rentmanrc");
        std::fs::write(&path, text).unwrap();
        path.display().to_string()
    }

    #[test]
    fn explicit_arguments_keep_default_timeout() {
        let cfg = resolve_config(
            Some("https://explicit.test".to_string()),
            Some("explicit-token".to_string()),
            None,
            env_from(&[]),
        )
        .unwrap();
        assert_eq!(cfg.timeout, ClientConfig::new("", "").timeout);
        assert!(!cfg.debug);
    }

    #[test]
    fn rc_file_fills_what_env_leaves_unset() {
        let dir = tempfile::tempdir().unwrap();
        let rc = write_rc(dir.path(), "url: https://rc.test
key: rc-token
debug: 1
");

        let cfg = resolve_config(None, None, None, env_from(&[("RENTMAN_RC", rc.as_str())])).unwrap();
        assert_eq!(cfg.url, "https://rc.test");
        assert_eq!(cfg.key, "rc-token");
        assert!(cfg.debug);
    }

    #[test]
    fn env_overrides_rc_file() {
        let dir = tempfile::tempdir().unwrap();
        let rc = write_rc(dir.path(), "url: https://rc.test
key: rc-token
debug: 1
");

        let cfg = resolve_config(
            None,
            None,
            None,
            env_from(&[
                ("RENTMAN_RC", rc.as_str()),
                ("RENTMAN_API_KEY", "env-token"),
                ("RENTMAN_DEBUG", "0"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.url, "https://rc.test");
        assert_eq!(cfg.key, "env-token");
        assert!(!cfg.debug);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let rc = write_rc(dir.path(), "url: https://rc.test
key: rc-token
");

        let cfg = resolve_config(
            None,
            None,
            None,
            env_from(&[("RENTMAN_RC", rc.as_str()), ("RENTMAN_URL", "  ")]),
        )
        .unwrap();
        assert_eq!(cfg.url, "https://rc.test");
    }

    #[test]
    fn missing_key_names_where_to_set_it() {
        let dir = tempfile::tempdir().unwrap();
        let rc = write_rc(dir.path(), "url: https://rc.test
");

        let err = resolve_config(None, None, None, env_from(&[("RENTMAN_RC", rc.as_str())])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("RENTMAN_API_KEY"), "{}", message);
        assert!(message.contains(&rc), "{}", message);
    }

    #[test]
    fn unreadable_rc_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().display().to_string();

        let err = resolve_config(None, None, None, env_from(&[("RENTMAN_RC", rc.as_str())])).unwrap_err();
        assert!(err.to_string().contains("failed to read configuration file"));
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag("0"));
    }
}
