//! Login and logout handlers.

use std::io::{self, IsTerminal};

use anyhow::anyhow;

use crate::cli::LoginArgs;
use crate::client::{AppContext, CliError, CliResult};

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let password = resolve_password(&args)?;
    ctx.sync.login(&args.username, &password).await?;
    println!("Logged in as {}", args.username.trim());
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    let was_authenticated = ctx.sync.session().is_authenticated();
    ctx.sync.logout();
    if was_authenticated {
        println!("Logged out");
    } else {
        println!("No active session");
    }
    Ok(())
}

pub(crate) fn resolve_password(args: &LoginArgs) -> CliResult<String> {
    if let Some(value) = &args.password {
        if value.is_empty() {
            return Err(CliError::validation("password cannot be empty"));
        }
        return Ok(value.clone());
    }

    if io::stdin().is_terminal() {
        let password = rpassword::prompt_password("Password: ").map_err(|err| {
            CliError::failure(anyhow!("failed to read password from stdin: {err}"))
        })?;
        if password.is_empty() {
            return Err(CliError::validation("password cannot be empty"));
        }
        Ok(password)
    } else {
        Err(CliError::validation(
            "password required; supply via --password when running non-interactively",
        ))
    }
}
