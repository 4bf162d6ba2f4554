//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stockroom_api_models::{RecordId, ReferenceKind};
use stockroom_sync::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, FilterCriteria, parse_base_url};
use stockroom_telemetry::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, ProcessSpanGuard, build_sha, init_logging,
};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliDependencies, CliResult};
use crate::commands::items::{
    StdinConfirm, handle_add, handle_edit, handle_list, handle_remove, handle_show,
};
use crate::commands::references::handle_refs;
use crate::commands::session::{handle_login, handle_logout};

/// Parse arguments, run the selected command, and return the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);
    let request_id = Uuid::new_v4().to_string();
    let command_name = command_label(&cli.command);
    let _span = ProcessSpanGuard::new(command_name, &request_id);

    let deps = match CliDependencies::from_env(&cli, &request_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let result = dispatch(cli.command, &deps.context, cli.output).await;
    deps.context.sync.shutdown();

    match result {
        Ok(()) => {
            tracing::debug!(command = command_name, "command completed");
            0
        }
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            tracing::warn!(command = command_name, exit_code, error = %message, "command failed");
            eprintln!("error: {message}");
            exit_code
        }
    }
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: option_env!("STOCKROOM_BUILD_SHA").unwrap_or_else(build_sha),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: {err:#}");
    }
}

pub(crate) async fn dispatch(
    command: Command,
    ctx: &AppContext,
    output: OutputFormat,
) -> CliResult<()> {
    match command {
        Command::Login(args) => handle_login(ctx, args).await,
        Command::Logout => handle_logout(ctx),
        Command::Ls(args) => handle_list(ctx, args, output).await,
        Command::Show(args) => handle_show(ctx, args, output).await,
        Command::Add(args) => handle_add(ctx, args).await,
        Command::Edit(args) => handle_edit(ctx, args).await,
        Command::Rm(args) => handle_remove(ctx, args, &StdinConfirm).await,
        Command::Refs(args) => handle_refs(ctx, args, output).await,
    }
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Ls(_) => "ls",
        Command::Show(_) => "show",
        Command::Add(_) => "add",
        Command::Edit(_) => "edit",
        Command::Rm(_) => "rm",
        Command::Refs(_) => "refs",
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

#[derive(Parser)]
#[command(name = "stockroom", about = "Command-line client for the Stockroom inventory service")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_API_URL",
        value_parser = parse_base_url,
        default_value = DEFAULT_API_URL,
        help = "Base URL of the inventory API"
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "HTTP request timeout in seconds"
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_STATE_FILE",
        help = "File holding the persisted session token"
    )]
    pub(crate) state_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log filter used when RUST_LOG is unset"
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_LOG_FORMAT",
        value_parser = parse_log_format,
        help = "Log output format (json|pretty|auto)"
    )]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Render command output as a table or JSON"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Exchange credentials for a session token.
    Login(LoginArgs),
    /// Forget the persisted session token.
    Logout,
    /// List items, optionally filtered.
    Ls(ListArgs),
    /// Show a single item.
    Show(ShowArgs),
    /// Create an item, optionally attaching an image.
    Add(AddArgs),
    /// Change fields of an item you own.
    Edit(EditArgs),
    /// Delete an item you own.
    Rm(RemoveArgs),
    /// List locations, tags, or groups.
    Refs(RefsArgs),
}

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    #[arg(long, env = "STOCKROOM_USERNAME", help = "Account username")]
    pub(crate) username: String,
    #[arg(
        long,
        env = "STOCKROOM_PASSWORD",
        help = "Account password; prompted for when omitted on a terminal"
    )]
    pub(crate) password: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ListArgs {
    #[arg(long, help = "Only items stored at this location id")]
    pub(crate) location: Option<RecordId>,
    #[arg(long, help = "Only items carrying this tag id")]
    pub(crate) tag: Option<RecordId>,
    #[arg(long, help = "Only items in this group id")]
    pub(crate) group: Option<RecordId>,
    #[arg(long, help = "Only items whose name matches this text")]
    pub(crate) name: Option<String>,
}

impl ListArgs {
    pub(crate) fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            location: self.location,
            tag: self.tag,
            group: self.group,
            search: self.name.clone(),
        }
        .normalized()
    }
}

#[derive(Args, Debug)]
pub(crate) struct ShowArgs {
    #[arg(help = "Item identifier")]
    pub(crate) id: RecordId,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ItemFieldArgs {
    #[arg(long, help = "Free-form description")]
    pub(crate) description: Option<String>,
    #[arg(long, help = "Location id")]
    pub(crate) location: Option<RecordId>,
    #[arg(long, help = "Group id")]
    pub(crate) group: Option<RecordId>,
    #[arg(long = "tag", help = "Tag id (repeatable)")]
    pub(crate) tags: Vec<RecordId>,
    #[arg(long, help = "Image file to upload after saving")]
    pub(crate) image: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct AddArgs {
    #[arg(long, help = "Item name")]
    pub(crate) name: String,
    #[command(flatten)]
    pub(crate) fields: ItemFieldArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct EditArgs {
    #[arg(help = "Item identifier")]
    pub(crate) id: RecordId,
    #[arg(long, help = "New item name")]
    pub(crate) name: Option<String>,
    #[command(flatten)]
    pub(crate) fields: ItemFieldArgs,
    #[arg(long, conflicts_with = "location", help = "Remove the location")]
    pub(crate) clear_location: bool,
    #[arg(long, conflicts_with = "group", help = "Remove the group")]
    pub(crate) clear_group: bool,
    #[arg(long, conflicts_with = "tags", help = "Remove every tag")]
    pub(crate) clear_tags: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RemoveArgs {
    #[arg(help = "Item identifier")]
    pub(crate) id: RecordId,
    #[arg(long, short = 'y', help = "Skip the confirmation prompt")]
    pub(crate) yes: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RefsArgs {
    #[arg(value_enum, help = "Reference collection to list")]
    pub(crate) kind: ReferenceKindArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReferenceKindArg {
    Locations,
    Tags,
    Groups,
}

impl From<ReferenceKindArg> for ReferenceKind {
    fn from(kind: ReferenceKindArg) -> Self {
        match kind {
            ReferenceKindArg::Locations => Self::Locations,
            ReferenceKindArg::Tags => Self::Tags,
            ReferenceKindArg::Groups => Self::Groups,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filters_parse_into_normalized_criteria() {
        let cli = Cli::try_parse_from(["stockroom", "ls", "--location", "3", "--name", "  "])
            .expect("parse");
        let Command::Ls(args) = &cli.command else {
            panic!("expected ls");
        };
        assert_eq!(args.criteria(), FilterCriteria::by_location(3));
        assert_eq!(command_label(&cli.command), "ls");
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn global_options_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "stockroom",
            "refs",
            "tags",
            "--output",
            "json",
            "--log-format",
            "pretty",
            "--api-url",
            "http://inventory.local/api",
        ])
        .expect("parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.log_format, Some(LogFormat::Pretty));
        assert_eq!(cli.api_url.as_str(), "http://inventory.local/api/");
        let Command::Refs(args) = cli.command else {
            panic!("expected refs");
        };
        assert_eq!(ReferenceKind::from(args.kind), ReferenceKind::Tags);
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let result = Cli::try_parse_from(["stockroom", "--api-url", "not a url", "logout"]);
        assert!(result.is_err());
    }

    #[test]
    fn edit_accepts_repeated_tags_and_rejects_conflicting_clears() {
        let cli = Cli::try_parse_from(["stockroom", "edit", "5", "--tag", "1", "--tag", "2"])
            .expect("parse");
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.fields.tags, vec![1, 2]);

        let conflict =
            Cli::try_parse_from(["stockroom", "edit", "5", "--tag", "1", "--clear-tags"]);
        assert!(conflict.is_err());
    }

    #[test]
    fn remove_confirmation_can_be_skipped() {
        let cli = Cli::try_parse_from(["stockroom", "rm", "4", "-y"]).expect("parse");
        let Command::Rm(args) = cli.command else {
            panic!("expected rm");
        };
        assert_eq!(args.id, 4);
        assert!(args.yes);
    }
}
