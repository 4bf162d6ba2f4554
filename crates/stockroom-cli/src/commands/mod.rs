//! Command handlers grouped by concern.

use anyhow::anyhow;
use stockroom_sync::{GuardDecision, ViewPhase};

use crate::client::{AppContext, CliError, CliResult};

pub(crate) mod items;
pub(crate) mod references;
pub(crate) mod session;

/// Visit `path`, failing when the guard redirects to the login route.
pub(crate) fn enter_route(ctx: &AppContext, path: &str) -> CliResult<()> {
    match ctx.sync.visit(path) {
        GuardDecision::Allow(_) => Ok(()),
        GuardDecision::Redirect(route) => {
            tracing::info!(requested = path, redirected_to = %route, "protected route requires login");
            Err(CliError::validation(format!(
                "login required (redirected to {route}); run `stockroom login` first"
            )))
        }
    }
}

/// Turn a settled view phase into a command result.
pub(crate) fn settled(phase: ViewPhase) -> CliResult<()> {
    match phase {
        ViewPhase::Ready => Ok(()),
        ViewPhase::Error(error) => Err(error.into()),
        ViewPhase::Idle => Err(CliError::validation(
            "login required; run `stockroom login` first",
        )),
        ViewPhase::LoadingIdentity | ViewPhase::LoadingData => {
            Err(CliError::failure(anyhow!("view did not finish loading")))
        }
    }
}
