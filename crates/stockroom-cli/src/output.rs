//! Rendering helpers for command output.

use anyhow::anyhow;
use serde::Serialize;
use stockroom_api_models::{Item, Reference, ReferenceEntry};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const NAME_WIDTH: usize = 28;

#[derive(Serialize)]
struct ItemRow<'a> {
    #[serde(flatten)]
    item: &'a Item,
    editable: bool,
}

pub(crate) fn render_item_list(
    items: &[Item],
    editable: impl Fn(&Item) -> bool,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<ItemRow<'_>> = items
                .iter()
                .map(|item| ItemRow {
                    item,
                    editable: editable(item),
                })
                .collect();
            print_json(&rows)?;
        }
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return Ok(());
            }
            println!(
                "{:>6}  {:<28}  {:<16}  {:<20}  {:>6}  EDIT",
                "ID", "NAME", "LOCATION", "TAGS", "IMAGES"
            );
            for item in items {
                println!(
                    "{:>6}  {:<28}  {:<16}  {:<20}  {:>6}  {}",
                    item.id,
                    truncate(&item.name, NAME_WIDTH),
                    format_reference(item.location.as_ref()),
                    format_tags(&item.tags),
                    item.images.len(),
                    if editable(item) { "yes" } else { "-" }
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_item_detail(item: &Item, editable: bool, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&ItemRow { item, editable })?,
        OutputFormat::Table => {
            println!("Item {}", item.id);
            println!("  name:        {}", item.name);
            if !item.description.is_empty() {
                println!("  description: {}", item.description);
            }
            println!("  location:    {}", format_reference(item.location.as_ref()));
            println!("  group:       {}", format_reference(item.group.as_ref()));
            println!("  tags:        {}", format_tags(&item.tags));
            println!("  owner:       {}", item.owner.label());
            println!("  created:     {}", item.created_at.to_rfc3339());
            println!("  editable:    {}", if editable { "yes" } else { "no" });
            if item.images.is_empty() {
                println!("  images:      -");
            } else {
                println!("  images:");
                for image in &item.images {
                    println!("    - {} ({})", image.url, image.uploaded_at.to_rfc3339());
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn render_references(entries: &[ReferenceEntry], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(entries)?,
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No entries found.");
                return Ok(());
            }
            println!("{:>6}  {:<24}  DESCRIPTION", "ID", "NAME");
            for entry in entries {
                println!(
                    "{:>6}  {:<24}  {}",
                    entry.id,
                    truncate(&entry.name, 24),
                    entry.description
                );
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON output: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn format_reference(reference: Option<&Reference>) -> String {
    reference.map_or_else(|| "-".to_string(), Reference::label)
}

pub(crate) fn format_tags(tags: &[Reference]) -> String {
    if tags.is_empty() {
        return "-".to_string();
    }
    tags.iter().map(Reference::label).collect::<Vec<_>>().join(",")
}

pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(width.saturating_sub(1)).collect();
    shortened.push('~');
    shortened
}
