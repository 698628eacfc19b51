//! Settings / Configuration.

use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Largest accepted value for any `*_secs` duration setting, about a century.
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Names of environments for otp-server.
/// Overrides serialization to force lower case in settings and
/// environment variables
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    /// Local environment (local testing). Uses in-memory storage and logs codes
    /// instead of emailing them.
    Local,
    /// Official Develop environment.
    Dev,
    /// Official environment.
    Staging,
    /// Official Production environment.
    Prod,
}

/// Implement display to force environment to lower case
impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

/// Database settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Database {
    /// Database URL
    pub url: String,
    /// Connect Timeout
    pub connect_timeout: u64,
}

/// Server settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    /// Server [AppEnvironment].
    pub environment: AppEnvironment,
    /// Server port.
    pub port: u16,
    /// Server timeout in milliseconds.
    pub timeout_ms: u64,
    /// Origins allowed to make credentialed cross-origin requests.
    /// Any origin is allowed (without credentials) when empty.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// One-time passcode lifecycle settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Otp {
    /// How long an issued code stays valid, in seconds.
    pub code_ttl_secs: u64,
    /// Failed attempts after which a pending code is expired.
    /// Unlimited when unset.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// How often the cleanup sweep runs, in seconds.
    pub cleanup_interval_secs: u64,
    /// How long verified or expired sessions are kept before the sweep deletes them, in seconds.
    pub retention_secs: u64,
}

impl Default for Otp {
    fn default() -> Self {
        Self {
            code_ttl_secs: 300,
            max_attempts: None,
            cleanup_interval_secs: 60,
            retention_secs: 86_400,
        }
    }
}

impl Otp {
    /// Code validity window.
    pub fn code_ttl(&self) -> Duration {
        seconds(self.code_ttl_secs)
    }

    /// Retention window for settled sessions.
    pub fn retention(&self) -> Duration {
        seconds(self.retention_secs)
    }

    /// Interval between cleanup sweeps.
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Session token settings.
#[derive(Clone, Deserialize)]
pub struct Token {
    /// HMAC-SHA256 signing secret.
    pub secret: String,
    /// Token lifetime in seconds.
    pub ttl_secs: u64,
    /// Value of the `iss` claim.
    pub issuer: String,
}

impl Token {
    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        seconds(self.ttl_secs)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Token")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Credential cookie settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Cookie {
    /// Set the session token as an HTTP-only cookie on successful verification.
    pub enabled: bool,
    /// Cookie name.
    pub name: String,
    /// Restrict the cookie to HTTPS.
    pub secure: bool,
}

impl Default for Cookie {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "authToken".to_string(),
            secure: false,
        }
    }
}

/// [Mailgun] settings.
///
/// [Mailgun]: https://www.mailgun.com/
#[derive(Clone, Deserialize)]
pub struct Mailgun {
    /// Mailgun API key.
    pub api_key: String,
    /// Mailgun domain.
    pub domain: String,
    /// Mailgun Subject
    pub subject: String,
    /// Mailgun From Address
    pub from_address: String,
    /// Mailgun From Name
    pub from_name: String,
    /// Mailgun Template
    pub template: String,
}

impl std::fmt::Debug for Mailgun {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Mailgun")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("subject", &self.subject)
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("template", &self.template)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
/// Application settings.
pub struct Settings {
    /// Server settings
    pub server: Server,
    /// Database settings
    pub database: Database,
    /// One-time passcode settings
    pub otp: Otp,
    /// Session token settings
    pub token: Token,
    /// Credential cookie settings
    pub cookie: Cookie,
    /// Mailgun settings
    pub mailgun: Mailgun,
    /// The path where the settings file resides.
    /// This can't actually be configured in the settings file itself, for obvious reasons.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load settings.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .unwrap_or(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/settings.toml"));
        // inject environment variables naming them properly on the settings
        // e.g. [otp] code_ttl_secs=300
        // would be injected with environment variable OTP_SERVER_OTP__CODE_TTL_SECS=300
        let s = Config::builder()
            .add_source(File::with_name(&path.as_path().display().to_string()))
            .add_source(
                Environment::with_prefix("OTP_SERVER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;
        let mut settings: Self = s.try_deserialize()?;
        settings.check_durations()?;
        settings.path = Some(path);
        Ok(settings)
    }

    /// Reject durations that would overflow timestamp arithmetic at request time.
    pub fn check_durations(&self) -> Result<(), ConfigError> {
        for (key, secs) in [
            ("otp.code_ttl_secs", self.otp.code_ttl_secs),
            ("otp.retention_secs", self.otp.retention_secs),
            ("token.ttl_secs", self.token.ttl_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::Message(format!(
                    "{key} must be at most {MAX_DURATION_SECS} seconds, got {secs}"
                )));
            }
        }

        Ok(())
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}
