//! `{{ env.VAR }}` placeholder expansion for raw TOML text, applied before
//! deserialization so config structs use plain `String`/`SecretString`.

use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Supports an optional default via `{{ env.VAR | default("fallback") }}`.
/// Lines starting with `#` are passed through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut result = String::with_capacity(line.len());
        let mut last_end = 0;

        for captures in re().captures_iter(line) {
            let overall = captures.get(0).expect("group 0 always matches");
            let key = captures.get(1).expect("key group is mandatory").as_str();
            let default_value = captures.get(2).map(|m| m.as_str());

            result.push_str(&line[last_end..overall.start()]);

            let mut parts = key.split('.');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("env"), Some(var_name), None) => match std::env::var(var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => match default_value {
                        Some(default) => result.push_str(default),
                        None => return Err(format!("environment variable not found: `{var_name}`")),
                    },
                },
                _ => return Err(format!("only variables scoped with 'env.' are supported: `{key}`")),
            }

            last_end = overall.end();
        }

        result.push_str(&line[last_end..]);
        output.push_str(&result);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_placeholders() {
        let input = "key = \"value\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn single_env_var() {
        temp_env::with_var("RELAYMUX_TEST_VAR", Some("hello"), || {
            let result = expand_env("key = \"{{ env.RELAYMUX_TEST_VAR }}\"").unwrap();
            assert_eq!(result, "key = \"hello\"");
        });
    }

    #[test]
    fn missing_env_var_errors() {
        temp_env::with_var_unset("RELAYMUX_MISSING_VAR", || {
            let err = expand_env("key = \"{{ env.RELAYMUX_MISSING_VAR }}\"").unwrap_err();
            assert!(err.contains("RELAYMUX_MISSING_VAR"));
        });
    }

    #[test]
    fn default_used_when_missing() {
        temp_env::with_var_unset("RELAYMUX_OPTIONAL_VAR", || {
            let result = expand_env("key = \"{{ env.RELAYMUX_OPTIONAL_VAR | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });
    }

    #[test]
    fn commented_lines_skip_expansion() {
        temp_env::with_var_unset("RELAYMUX_MISSING_VAR", || {
            let input = "# key = \"{{ env.RELAYMUX_MISSING_VAR }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
