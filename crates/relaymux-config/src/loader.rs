use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        Self::load_str(&raw)
    }

    /// Load configuration from raw TOML text, applying the same expansion
    /// and validation as [`Config::load`]
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn load_str(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// Per spec.md §8 boundary behaviors: an empty provider list fails
    /// validation outright (no silent default); a router entry naming a
    /// missing provider is *not* a validation error here — that is left to
    /// the pipeline table builder, which skips it with a warning instead
    /// of failing the whole build.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider table is empty, any provider's
    /// `api_base_url` is not a valid URL, or any provider's model
    /// include/exclude patterns are not valid regex
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("config-invalid: at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            url::Url::parse(&provider.api_base_url)
                .map_err(|e| anyhow::anyhow!("config-invalid: invalid api_base_url for provider '{name}': {e}"))?;

            for pattern in &provider.models.include {
                regex::Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("config-invalid: invalid model include pattern for provider '{name}': {e}"))?;
            }
            for pattern in &provider.models.exclude {
                regex::Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("config-invalid: invalid model exclude pattern for provider '{name}': {e}"))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [providers.p1]
        api_base_url = "http://localhost:1234/v1"
        api_key = "k1"
        protocol = "openai"

        [router]
        default = "p1,local-model"
    "#;

    #[test]
    fn loads_minimal_config() {
        let config = Config::load_str(MINIMAL).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.router.get("default").unwrap(), "p1,local-model");
    }

    #[test]
    fn empty_providers_is_config_invalid() {
        let err = Config::load_str("[router]\ndefault = \"p1,m1\"\n").unwrap_err();
        assert!(err.to_string().contains("config-invalid"));
    }

    #[test]
    fn expands_env_vars_before_parsing() {
        temp_env::with_var("RELAYMUX_TEST_KEY", Some("secret-value"), || {
            let toml = r#"
                [providers.p1]
                api_base_url = "http://localhost:1234/v1"
                api_key = "{{ env.RELAYMUX_TEST_KEY }}"
                protocol = "openai"

                [router]
                default = "p1,m1"
            "#;
            let config = Config::load_str(toml).unwrap();
            assert_eq!(config.providers.len(), 1);
        });
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = format!("{MINIMAL}\n[bogus]\nx = 1\n");
        assert!(Config::load_str(&toml).is_err());
    }

    #[test]
    fn malformed_api_base_url_is_config_invalid() {
        let toml = r#"
            [providers.p1]
            api_base_url = "not a url"
            api_key = "k1"
            protocol = "openai"

            [router]
            default = "p1,m1"
        "#;
        let err = Config::load_str(toml).unwrap_err();
        assert!(err.to_string().contains("config-invalid"));
        assert!(err.to_string().contains("api_base_url"));
    }
}
