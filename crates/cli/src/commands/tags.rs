use bizflow_model::{Customer, RecordId};
use bizflow_storage::MemoryBackend;
use bizflow_view::{tags, BulkReport, OwnerScope, ViewAction};

use crate::commands::{note, open_scope, persist};
use crate::{print_json, Context, OutputFormat, TagsCommands};

pub(crate) async fn cmd_tags(ctx: &Context, command: TagsCommands) -> Result<(), String> {
    let (data, backend, mut scope) =
        open_scope::<Customer>(ctx, ctx.config.view.page_size).await?;

    let report = match command {
        TagsCommands::List => {
            let counts = tags::tag_counts(scope.view().store().iter().map(|c| c.tags.as_slice()));
            return match ctx.output {
                OutputFormat::Json => print_json(
                    &counts
                        .iter()
                        .map(|(tag, count)| serde_json::json!({ "tag": tag, "count": count }))
                        .collect::<Vec<_>>(),
                ),
                OutputFormat::Text => {
                    for (tag, count) in &counts {
                        println!("{}  {}", tag, count);
                    }
                    Ok(())
                }
            };
        }
        TagsCommands::Add { ids, tags } => {
            select(&mut scope, &ids)?;
            scope.add_tags_to_selection(&tags).await
        }
        TagsCommands::Remove { ids, tags } => {
            select(&mut scope, &ids)?;
            scope.remove_tags_from_selection(&tags).await
        }
        TagsCommands::Rename { from, to } => scope
            .rename_tag(&from, &to)
            .await
            .map_err(|e| e.to_string())?,
        TagsCommands::Delete { tag } => scope.delete_tag(&tag).await,
    };

    persist(ctx, data, &backend).await?;
    print_report(ctx, &report)?;
    if report.is_clean() {
        Ok(())
    } else {
        Err(format!("{} updates failed", report.failed.len()))
    }
}

/// Select every known id given on the command line.
fn select(
    scope: &mut OwnerScope<Customer, MemoryBackend>,
    ids: &[String],
) -> Result<(), String> {
    for raw in ids {
        let id = RecordId::from(raw.as_str());
        if !scope.view().store().contains(&id) {
            tracing::warn!(record = %id, "skipping unknown customer");
            continue;
        }
        if !scope.view().selection().contains(&id) {
            scope
                .apply(ViewAction::Toggle(id))
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn print_report(ctx: &Context, report: &BulkReport) -> Result<(), String> {
    match ctx.output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "updated": report.succeeded,
            "skipped": report.skipped,
            "failed": report
                .failed
                .iter()
                .map(|(id, err)| serde_json::json!({ "id": id, "error": err.to_string() }))
                .collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            note(ctx, report.to_string());
            Ok(())
        }
    }
}
