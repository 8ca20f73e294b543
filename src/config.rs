//! Run configuration: endpoints, contact identity, output location, pacing.
//!
//! Everything here is validated once at startup. A [`ConfigError`] is the
//! only kind of error that stops a run before any item is processed.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::fetch::{FetchError, FetchSettings, HttpFetcher};
use crate::harvest::{PacingPolicy, RetryPolicy};

/// Default `OpenAlex` API base.
pub const DEFAULT_OPENALEX_URL: &str = "https://api.openalex.org";
/// Default arXiv query endpoint.
pub const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org/api/query";
/// Default CORE API base.
pub const DEFAULT_CORE_URL: &str = "https://api.core.ac.uk";
/// Default Unpaywall API base.
pub const DEFAULT_UNPAYWALL_URL: &str = "https://api.unpaywall.org";
/// Default DOI resolver.
pub const DEFAULT_DOI_RESOLVER_URL: &str = "https://doi.org";

/// Upper bound accepted for `--max-retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

const WRITE_PROBE_NAME: &str = ".harvester-write-probe";

/// Errors that make a run impossible to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A contact email is required for this command.
    #[error("What: missing contact email\nWhy: {command} sends it to OA lookup services\nFix: pass --email you@example.org")]
    MissingEmail {
        /// Subcommand that needs the email.
        command: &'static str,
    },

    /// The email is not a plausible address.
    #[error("What: invalid contact email '{email}'\nWhy: expected local@domain\nFix: pass a real address via --email")]
    InvalidEmail {
        /// The rejected value.
        email: String,
    },

    /// The output directory cannot be created or written.
    #[error("What: output directory {path} is not writable\nWhy: {source}\nFix: choose another directory or fix its permissions")]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A required input file does not exist.
    #[error("What: input file {path} not found\nFix: check the path passed to --input")]
    MissingInput {
        /// The missing path.
        path: PathBuf,
    },

    /// A numeric option is out of range.
    #[error("What: invalid value {value} for {name}\nWhy: {reason}")]
    InvalidCap {
        /// Option name.
        name: &'static str,
        /// Rejected value.
        value: u64,
        /// Accepted range.
        reason: &'static str,
    },

    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] FetchError),
}

/// Base URLs of every external service.
///
/// Each can be overridden with an environment variable (see
/// [`from_env`](Self::from_env)) so end-to-end tests can point the binary at
/// a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `OpenAlex` API base.
    pub openalex: String,
    /// arXiv Atom query endpoint.
    pub arxiv: String,
    /// CORE v3 API base.
    pub core: String,
    /// Unpaywall API base.
    pub unpaywall: String,
    /// DOI resolver used for content negotiation.
    pub doi_resolver: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openalex: DEFAULT_OPENALEX_URL.to_string(),
            arxiv: DEFAULT_ARXIV_URL.to_string(),
            core: DEFAULT_CORE_URL.to_string(),
            unpaywall: DEFAULT_UNPAYWALL_URL.to_string(),
            doi_resolver: DEFAULT_DOI_RESOLVER_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Every service rooted at one base URL (mock servers).
    ///
    /// arXiv lives at `{base}/api/query` and the DOI resolver at `{base}/doi`.
    #[must_use]
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            openalex: base.to_string(),
            arxiv: format!("{base}/api/query"),
            core: base.to_string(),
            unpaywall: base.to_string(),
            doi_resolver: format!("{base}/doi"),
        }
    }

    /// Defaults, overridden by `HARVESTER_OPENALEX_URL`, `HARVESTER_ARXIV_URL`,
    /// `HARVESTER_CORE_URL`, `HARVESTER_UNPAYWALL_URL`, `HARVESTER_DOI_RESOLVER_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        let pick = |var: &str, default: String| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            openalex: pick("HARVESTER_OPENALEX_URL", defaults.openalex),
            arxiv: pick("HARVESTER_ARXIV_URL", defaults.arxiv),
            core: pick("HARVESTER_CORE_URL", defaults.core),
            unpaywall: pick("HARVESTER_UNPAYWALL_URL", defaults.unpaywall),
            doi_resolver: pick("HARVESTER_DOI_RESOLVER_URL", defaults.doi_resolver),
        }
    }
}

/// Validated settings shared by every command.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Contact email, when one was given and validated.
    pub contact_email: Option<String>,
    /// Root directory for run output.
    pub output_dir: PathBuf,
    /// HTTP client settings.
    pub fetch: FetchSettings,
    /// Sleep lengths.
    pub pacing: PacingPolicy,
    /// Page-level retry bounds.
    pub retry: RetryPolicy,
    /// Service base URLs.
    pub endpoints: Endpoints,
}

impl RunConfig {
    /// Starts from defaults for everything but the output directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            contact_email: None,
            output_dir: output_dir.into(),
            fetch: FetchSettings::default(),
            pacing: PacingPolicy::default(),
            retry: RetryPolicy::default(),
            endpoints: Endpoints::default(),
        }
    }

    /// Validates and stores the contact email (also used in the User-Agent).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEmail`] for implausible addresses.
    pub fn with_contact_email(mut self, email: Option<&str>) -> Result<Self, ConfigError> {
        self.contact_email = email.map(validate_email).transpose()?;
        self.fetch.contact_email.clone_from(&self.contact_email);
        Ok(self)
    }

    /// Returns the contact email or the error naming `command`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEmail`] when no email was configured.
    pub fn require_contact_email(&self, command: &'static str) -> Result<&str, ConfigError> {
        self.contact_email
            .as_deref()
            .ok_or(ConfigError::MissingEmail { command })
    }

    /// Builds the shared HTTP fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if the TLS backend fails to initialize.
    pub fn fetcher(&self) -> Result<HttpFetcher, ConfigError> {
        Ok(HttpFetcher::new(&self.fetch)?)
    }
}

/// Checks that `email` looks like `local@domain.tld` and returns it trimmed.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEmail`] otherwise.
pub fn validate_email(email: &str) -> Result<String, ConfigError> {
    let trimmed = email.trim();
    let invalid = || ConfigError::InvalidEmail {
        email: email.to_string(),
    };
    if trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

/// Rejects a zero value for a cap that must be positive.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidCap`] when `value` is zero.
pub fn require_positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidCap {
            name,
            value,
            reason: "must be at least 1",
        });
    }
    Ok(value)
}

/// Checks the retry count against [`MAX_RETRIES_LIMIT`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidCap`] when above the limit.
pub fn validate_max_retries(value: u32) -> Result<u32, ConfigError> {
    if value > MAX_RETRIES_LIMIT {
        return Err(ConfigError::InvalidCap {
            name: "--max-retries",
            value: u64::from(value),
            reason: "must be between 0 and 10",
        });
    }
    Ok(value)
}

/// Creates `path` if needed and proves it is writable.
///
/// # Errors
///
/// Returns [`ConfigError::OutputDir`] when the directory cannot be created
/// or a probe file cannot be written in it.
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let wrap = |source| ConfigError::OutputDir {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(path).map_err(wrap)?;
    let probe = path.join(WRITE_PROBE_NAME);
    std::fs::write(&probe, b"").map_err(wrap)?;
    let _ = std::fs::remove_file(&probe);
    debug!(path = %path.display(), "output directory ready");
    Ok(path.to_path_buf())
}

/// Checks that an input file exists.
///
/// # Errors
///
/// Returns [`ConfigError::MissingInput`] otherwise.
pub fn require_input_file(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}
