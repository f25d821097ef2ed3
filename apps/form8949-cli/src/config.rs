//! Configuration file for the form8949 CLI
//!
//! Every section is optional. Values given on the command line win over
//! values from the file.

use anyhow::Context;
use form8949_core::template::DEFAULT_TIMEOUT;
use form8949_core::{BoxSelection, InputVariant, LayoutProfile, LayoutRegistry, TemplateCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub taxpayer: TaxpayerConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Extra or replacement coordinate profiles
    #[serde(default)]
    pub layouts: Vec<LayoutProfile>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Built-in layouts merged with the `[[layouts]]` tables
    pub fn layout_registry(&self) -> anyhow::Result<LayoutRegistry> {
        if self.layouts.is_empty() {
            return Ok(LayoutRegistry::builtin());
        }
        LayoutRegistry::with_overrides(self.layouts.clone()).context("Invalid [[layouts]] table")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxpayerConfig {
    pub name: Option<String>,
    pub tin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormConfig {
    pub tax_year: Option<i32>,
    #[serde(rename = "box")]
    pub box_selection: Option<BoxSelection>,
    pub variant: Option<InputVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// URL for years without their own entry
    pub default: Option<String>,
    /// Local file or directory, used instead of downloading
    pub path: Option<PathBuf>,
    #[serde(rename = "timeout_secs", with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
    /// Tax year to URL
    #[serde(default)]
    pub years: BTreeMap<String, String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            default: None,
            path: None,
            timeout: DEFAULT_TIMEOUT,
            years: BTreeMap::new(),
        }
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl TemplatesConfig {
    /// Built-in download locations with the configured ones on top
    pub fn catalog(&self) -> anyhow::Result<TemplateCatalog> {
        let mut catalog = TemplateCatalog::builtin();
        if let Some(default) = &self.default {
            catalog = catalog.with_default(default.clone());
        }
        for (year, url) in &self.years {
            let year: i32 = year
                .trim()
                .parse()
                .with_context(|| format!("Invalid year '{}' in [templates.years]", year))?;
            catalog = catalog.with_year(year, url.clone());
        }
        Ok(catalog)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_empty_config() {
        let config = Config::from_str("").unwrap();
        assert!(config.taxpayer.name.is_none());
        assert!(config.form.tax_year.is_none());
        assert_eq!(config.templates.timeout, DEFAULT_TIMEOUT);
        assert!(config.layouts.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [taxpayer]
            name = "Jane Q Public"
            tin = "123-45-6789"

            [form]
            tax_year = 2023
            box = "B"
            variant = "exchange"

            [templates]
            default = "https://example.test/f8949.pdf"
            timeout_secs = 5

            [templates.years]
            2022 = "https://example.test/f8949--2022.pdf"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.taxpayer.name.as_deref(), Some("Jane Q Public"));
        assert_eq!(config.form.tax_year, Some(2023));
        assert_eq!(config.form.box_selection, Some(BoxSelection::B));
        assert_eq!(config.form.variant, Some(InputVariant::Exchange));
        assert_eq!(config.templates.timeout, Duration::from_secs(5));

        let catalog = config.templates.catalog().unwrap();
        assert_eq!(catalog.url_for(2022), "https://example.test/f8949--2022.pdf");
        assert_eq!(catalog.url_for(2024), "https://example.test/f8949.pdf");
        assert_eq!(
            catalog.url_for(2021),
            "https://www.irs.gov/pub/irs-prior/f8949--2021.pdf"
        );
    }

    #[test]
    fn test_invalid_template_year() {
        let toml = r#"
            [templates.years]
            last = "https://example.test/f8949.pdf"
        "#;
        let config = Config::from_str(toml).unwrap();
        assert!(config.templates.catalog().is_err());
    }

    #[test]
    fn test_layout_override_roundtrips_through_toml() {
        let mut profile = LayoutProfile::revision_2022();
        profile.revision = "custom".to_string();
        profile.part_one.table.row_base = 428.0;
        let config = Config {
            layouts: vec![profile],
            ..Config::default()
        };

        let text = toml::to_string(&config).unwrap();
        let parsed = Config::from_str(&text).unwrap();
        let registry = parsed.layout_registry().unwrap();
        assert_eq!(registry.get("custom").unwrap().part_one.table.row_base, 428.0);
        assert_eq!(registry.profiles().len(), 3);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut profile = LayoutProfile::revision_2022();
        profile.part_two.table.capacity = 10;
        let config = Config {
            layouts: vec![profile],
            ..Config::default()
        };
        assert!(config.layout_registry().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
