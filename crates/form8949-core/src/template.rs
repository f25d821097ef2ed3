//! Base form acquisition
//!
//! The official form is fetched once per request. Failure is an expected
//! outcome, not an error: callers get [`TemplateOutcome::Unavailable`] and
//! switch to the fallback renderer.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::FormError;

/// Current revision of the form.
pub const DEFAULT_FORM_URL: &str = "https://www.irs.gov/pub/irs-pdf/f8949.pdf";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    Available(Vec<u8>),
    Unavailable { reason: String },
}

impl TemplateOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        TemplateOutcome::Unavailable {
            reason: reason.into(),
        }
    }

    /// Accept `bytes` only if they look like a PDF.
    fn from_bytes(bytes: Vec<u8>, origin: &str) -> Self {
        if bytes.starts_with(PDF_MAGIC) {
            TemplateOutcome::Available(bytes)
        } else {
            Self::unavailable(format!("{} did not return a PDF", origin))
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TemplateOutcome::Available(_))
    }
}

/// Anything that can provide the base form for a tax year.
pub trait TemplateSource {
    fn acquire(&self, year: i32) -> TemplateOutcome;
}

/// Download locations per tax year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCatalog {
    default: String,
    years: BTreeMap<i32, String>,
}

impl TemplateCatalog {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            years: BTreeMap::new(),
        }
    }

    /// Prior-year revisions archived by the IRS plus the current form.
    pub fn builtin() -> Self {
        let mut catalog = Self::new(DEFAULT_FORM_URL);
        for year in 2021..=2023 {
            catalog = catalog.with_year(
                year,
                format!("https://www.irs.gov/pub/irs-prior/f8949--{}.pdf", year),
            );
        }
        catalog
    }

    pub fn with_year(mut self, year: i32, url: impl Into<String>) -> Self {
        self.years.insert(year, url.into());
        self
    }

    pub fn with_default(mut self, url: impl Into<String>) -> Self {
        self.default = url.into();
        self
    }

    pub fn url_for(&self, year: i32) -> &str {
        self.years.get(&year).unwrap_or(&self.default)
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Downloads the form over HTTPS. One attempt, no retry.
pub struct HttpTemplateSource {
    catalog: TemplateCatalog,
    client: reqwest::blocking::Client,
}

impl HttpTemplateSource {
    pub fn new(catalog: TemplateCatalog, timeout: Duration) -> Result<Self, FormError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("form8949/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FormError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { catalog, client })
    }
}

impl TemplateSource for HttpTemplateSource {
    fn acquire(&self, year: i32) -> TemplateOutcome {
        let url = self.catalog.url_for(year);
        info!(url, year, "Fetching base form");

        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => return TemplateOutcome::unavailable(format!("Request to {} failed: {}", url, e)),
        };
        let status = response.status();
        if !status.is_success() {
            return TemplateOutcome::unavailable(format!("{} answered {}", url, status));
        }
        match response.bytes() {
            Ok(body) => TemplateOutcome::from_bytes(body.to_vec(), url),
            Err(e) => TemplateOutcome::unavailable(format!("Reading {} failed: {}", url, e)),
        }
    }
}

/// Reads the form from disk. A directory is searched for
/// `f8949-{year}.pdf`, then `f8949.pdf`.
#[derive(Debug, Clone)]
pub struct FileTemplateSource {
    path: PathBuf,
}

impl FileTemplateSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn candidates(&self, year: i32) -> Vec<PathBuf> {
        if self.path.is_dir() {
            vec![
                self.path.join(format!("f8949-{}.pdf", year)),
                self.path.join("f8949.pdf"),
            ]
        } else {
            vec![self.path.clone()]
        }
    }
}

impl TemplateSource for FileTemplateSource {
    fn acquire(&self, year: i32) -> TemplateOutcome {
        let Some(path) = self.candidates(year).into_iter().find(|p| p.is_file()) else {
            return TemplateOutcome::unavailable(format!(
                "No base form for {} at {}",
                year,
                self.path.display()
            ));
        };

        info!(path = %path.display(), year, "Reading base form");
        match fs::read(&path) {
            Ok(bytes) => TemplateOutcome::from_bytes(bytes, &path.display().to_string()),
            Err(e) => TemplateOutcome::unavailable(format!("Reading {} failed: {}", path.display(), e)),
        }
    }
}

/// Never provides a form; every page uses the fallback renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTemplateSource;

impl TemplateSource for OfflineTemplateSource {
    fn acquire(&self, _year: i32) -> TemplateOutcome {
        TemplateOutcome::unavailable("Offline mode")
    }
}
