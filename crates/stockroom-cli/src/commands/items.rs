//! Item listing, detail, and mutation handlers.

use std::io::{self, BufRead, Write};
use std::path::Path;

use stockroom_api_models::{Item, ItemDraft, RecordId};
use stockroom_sync::{Asset, Confirm, DeleteRequest, MutationOutcome, UploadStatus};

use super::{enter_route, settled};
use crate::cli::{AddArgs, EditArgs, ItemFieldArgs, ListArgs, OutputFormat, RemoveArgs, ShowArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_item_detail, render_item_list};

pub(crate) async fn handle_list(
    ctx: &AppContext,
    args: ListArgs,
    output: OutputFormat,
) -> CliResult<()> {
    enter_route(ctx, "/items")?;
    let view = ctx.sync.item_list_view(args.criteria());
    settled(view.start().await)?;
    let items = view.items();
    render_item_list(&items, |item| view.can_edit(item), output)
}

pub(crate) async fn handle_show(
    ctx: &AppContext,
    args: ShowArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let item = load_item(ctx, args.id, &format!("/items/{}", args.id)).await?;
    render_item_detail(&item.item, item.editable, output)
}

pub(crate) async fn handle_add(ctx: &AppContext, args: AddArgs) -> CliResult<()> {
    enter_route(ctx, "/items/new")?;
    let asset = read_asset(args.fields.image.as_deref()).await?;
    let draft = ItemDraft {
        name: args.name,
        description: args.fields.description.clone().unwrap_or_default(),
        location: args.fields.location,
        group: args.fields.group,
        tags: args.fields.tags.clone(),
    };
    let outcome = ctx.sync.mutations().create(draft, asset).await?;
    report("Created", &outcome);
    Ok(())
}

pub(crate) async fn handle_edit(ctx: &AppContext, args: EditArgs) -> CliResult<()> {
    let loaded = load_item(ctx, args.id, &format!("/items/{}/edit", args.id)).await?;
    if !loaded.editable {
        return Err(not_owner(args.id));
    }
    let asset = read_asset(args.fields.image.as_deref()).await?;
    let draft = merge_edit(&loaded.item, &args);
    let outcome = ctx.sync.mutations().update(args.id, draft, asset).await?;
    report("Updated", &outcome);
    Ok(())
}

pub(crate) async fn handle_remove(
    ctx: &AppContext,
    args: RemoveArgs,
    confirm: &dyn Confirm,
) -> CliResult<()> {
    let loaded = load_item(ctx, args.id, &format!("/items/{}", args.id)).await?;
    if !loaded.editable {
        return Err(not_owner(args.id));
    }
    let mutations = ctx.sync.mutations();
    let request = mutations.prepare_delete(args.id);
    let confirmed = if args.yes {
        Some(request.confirm())
    } else {
        request.confirm_with(confirm)
    };
    let Some(confirmed) = confirmed else {
        println!("Delete cancelled; item {} kept", args.id);
        return Ok(());
    };
    mutations.delete(confirmed).await?;
    println!("Deleted item {} ({})", args.id, loaded.item.name);
    Ok(())
}

/// Prompt on stdin for delete confirmation.
pub(crate) struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, request: &DeleteRequest) -> bool {
        eprint!("Delete item {}? [y/N] ", request.id());
        if let Err(err) = io::stderr().flush() {
            tracing::debug!(error = %err, "failed to flush confirmation prompt");
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_affirmative(&answer)
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

struct LoadedItem {
    item: Item,
    editable: bool,
}

async fn load_item(ctx: &AppContext, id: RecordId, path: &str) -> CliResult<LoadedItem> {
    enter_route(ctx, path)?;
    let view = ctx.sync.item_detail_view(id);
    settled(view.start().await)?;
    let item = view
        .item()
        .ok_or_else(|| CliError::validation(format!("item {id} was not found")))?;
    Ok(LoadedItem {
        editable: view.can_edit(),
        item,
    })
}

async fn read_asset(path: Option<&Path>) -> CliResult<Option<Asset>> {
    let Some(path) = path else {
        return Ok(None);
    };
    Asset::from_path(path).await.map(Some).map_err(|err| {
        CliError::validation(format!("failed to read image '{}': {err}", path.display()))
    })
}

fn not_owner(id: RecordId) -> CliError {
    CliError::validation(format!("item {id} belongs to another user and cannot be changed"))
}

fn merge_edit(item: &Item, args: &EditArgs) -> ItemDraft {
    let fields: &ItemFieldArgs = &args.fields;
    let mut draft = ItemDraft::from_item(item);
    if let Some(name) = &args.name {
        draft.name.clone_from(name);
    }
    if let Some(description) = &fields.description {
        draft.description.clone_from(description);
    }
    if args.clear_location {
        draft.location = None;
    } else if fields.location.is_some() {
        draft.location = fields.location;
    }
    if args.clear_group {
        draft.group = None;
    } else if fields.group.is_some() {
        draft.group = fields.group;
    }
    if args.clear_tags {
        draft.tags.clear();
    } else if !fields.tags.is_empty() {
        draft.tags.clone_from(&fields.tags);
    }
    draft
}

fn report(action: &str, outcome: &MutationOutcome) {
    println!("{action} item {}", outcome.item_id);
    match &outcome.upload {
        UploadStatus::NotRequested => {}
        UploadStatus::Uploaded => println!("Image uploaded"),
        UploadStatus::Failed(err) => {
            eprintln!(
                "warning: item {} was saved but the image upload failed: {}",
                outcome.item_id,
                err.user_message()
            );
        }
    }
}
