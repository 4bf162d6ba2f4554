//! Shared error types, session wiring, and context for the CLI.

use std::env;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use stockroom_sync::{ClientConfig, FileTokenStore, SyncContext, SyncError};

use crate::cli::Cli;

const STATE_DIR: &str = ".stockroom";
const STATE_FILE: &str = "session.json";
const FALLBACK_STATE_FILE: &str = ".stockroom-session.json";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<SyncError> for CliError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::AuthFailure { .. } | SyncError::ValidationFailure { .. } => {
                Self::Validation(error.user_message())
            }
            SyncError::NetworkFailure { .. } | SyncError::PartialFailure { .. } => {
                Self::Failure(anyhow!(error.user_message()))
            }
        }
    }
}

/// Dependencies constructed from environment flags and CLI options.
pub(crate) struct CliDependencies {
    pub(crate) context: AppContext,
}

impl CliDependencies {
    /// Restore the persisted session and build the HTTP-backed sync context.
    pub(crate) fn from_env(cli: &Cli, request_id: &str) -> CliResult<Self> {
        let config = ClientConfig::new(cli.api_url.clone(), request_id)
            .with_timeout(Duration::from_secs(cli.timeout));
        let state_file = cli.state_file.clone().unwrap_or_else(default_state_file);
        tracing::debug!(
            api = %config.normalized_base_url(),
            state_file = %state_file.display(),
            "client configured"
        );
        let sync = SyncContext::open(&config, Box::new(FileTokenStore::new(state_file)))
            .map_err(|err| {
                CliError::failure(anyhow!("failed to initialise client: {}", err.user_message()))
            })?;
        Ok(Self {
            context: AppContext { sync },
        })
    }
}

/// Runtime context shared by command handlers.
pub(crate) struct AppContext {
    pub(crate) sync: SyncContext,
}

/// Session file under `$HOME/.stockroom`, or the working directory when `HOME` is unset.
pub(crate) fn default_state_file() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map_or_else(
            || PathBuf::from(FALLBACK_STATE_FILE),
            |home| PathBuf::from(home).join(STATE_DIR).join(STATE_FILE),
        )
}

#[cfg(test)]
pub(crate) fn test_context(server: &httpmock::MockServer, token: Option<&str>) -> AppContext {
    use std::sync::Arc;
    use stockroom_sync::{HttpInventoryApi, MemoryTokenStore, SessionStore, parse_base_url};

    let store = token.map_or_else(MemoryTokenStore::default, MemoryTokenStore::with_token);
    let session = Arc::new(SessionStore::initialize(Box::new(store)));
    let base = parse_base_url(&server.url("/api/")).expect("valid URL");
    let api = HttpInventoryApi::new(&ClientConfig::new(base, "req-cli"), Arc::clone(&session))
        .expect("client");
    AppContext {
        sync: SyncContext::with_api(session, Arc::new(api)),
    }
}
