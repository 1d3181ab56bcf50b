use anyhow::Context;

pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_FELLOWS_TABLE: &str = "Fellows";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_id: String,
    pub fellows_table: String,
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Self {
            api_key: non_empty("AIRTABLE_API_KEY")
                .context("AIRTABLE_API_KEY must be set to an API token for the fellows base")?,
            base_id: non_empty("AIRTABLE_BASE_ID")
                .context("AIRTABLE_BASE_ID must be set to the fellows base id")?,
            fellows_table: non_empty("AIRTABLE_TABLE_NAME")
                .unwrap_or_else(|| DEFAULT_FELLOWS_TABLE.to_string()),
            api_url: non_empty("AIRTABLE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config =
            Config::from_lookup(lookup(&[("AIRTABLE_API_KEY", "pat1"), ("AIRTABLE_BASE_ID", "app1")]))
                .unwrap();
        assert_eq!(config.fellows_table, DEFAULT_FELLOWS_TABLE);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = Config::from_lookup(lookup(&[("AIRTABLE_BASE_ID", "app1"), ("AIRTABLE_API_KEY", " ")]))
            .unwrap_err();
        assert!(err.to_string().contains("AIRTABLE_API_KEY"));
    }

    #[test]
    fn overrides_are_respected() {
        let config = Config::from_lookup(lookup(&[
            ("AIRTABLE_API_KEY", "pat1"),
            ("AIRTABLE_BASE_ID", "app1"),
            ("AIRTABLE_TABLE_NAME", "Current Fellows"),
            ("AIRTABLE_API_URL", "http://localhost:8080/v0"),
        ]))
        .unwrap();
        assert_eq!(config.fellows_table, "Current Fellows");
        assert_eq!(config.api_url, "http://localhost:8080/v0");
    }
}
