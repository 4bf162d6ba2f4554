//! Reference list handler.

use stockroom_api_models::ReferenceKind;

use crate::cli::{OutputFormat, RefsArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_references;

pub(crate) async fn handle_refs(
    ctx: &AppContext,
    args: RefsArgs,
    output: OutputFormat,
) -> CliResult<()> {
    if !ctx.sync.session().is_authenticated() {
        return Err(CliError::validation(
            "login required; run `stockroom login` first",
        ));
    }
    let kind = ReferenceKind::from(args.kind);
    let entries = ctx.sync.references().load(kind).await?;
    tracing::debug!(kind = kind.as_str(), count = entries.len(), "references loaded");
    render_references(&entries, output)
}
