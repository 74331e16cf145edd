use std::sync::Arc;

use bizflow_model::{RecordId, RecordKind};
use bizflow_storage::{MemoryBackend, RecordStorage};
use bizflow_view::NotesScope;

use crate::commands::{note, persist};
use crate::data::DataFile;
use crate::render::Line;
use crate::{print_json, Context, NotesCommands, OutputFormat};

pub(crate) async fn cmd_notes(ctx: &Context, command: NotesCommands) -> Result<(), String> {
    match command {
        NotesCommands::List { customer } => {
            let (_, _, scope) = open_notes(ctx, &customer).await?;
            match ctx.output {
                OutputFormat::Json => print_json(&scope.notes()),
                OutputFormat::Text => {
                    if scope.is_empty() {
                        note(ctx, format!("no notes for {}", customer));
                    }
                    for n in scope.notes() {
                        println!("{}", n.line());
                    }
                    Ok(())
                }
            }
        }
        NotesCommands::Add { customer, content } => {
            let (data, backend, mut scope) = open_notes(ctx, &customer).await?;
            let added = scope.add(&content).await.map_err(|e| e.to_string())?;
            persist(ctx, data, &backend).await?;
            match ctx.output {
                OutputFormat::Json => print_json(&added),
                OutputFormat::Text => {
                    note(ctx, format!("added note {} to {}", added.meta.id, customer));
                    Ok(())
                }
            }
        }
        NotesCommands::Delete { customer, id } => {
            let (data, backend, mut scope) = open_notes(ctx, &customer).await?;
            let id = RecordId::from(id);
            if !scope.notes().iter().any(|n| n.meta.id == id) {
                return Err(format!("note not found: {}", id));
            }
            scope.delete(&id).await.map_err(|e| e.to_string())?;
            persist(ctx, data, &backend).await?;
            match ctx.output {
                OutputFormat::Json => print_json(&serde_json::json!({ "deleted": id })),
                OutputFormat::Text => {
                    note(ctx, format!("deleted note {}", id));
                    Ok(())
                }
            }
        }
    }
}

/// Open the notes of one of the owner's customers.
async fn open_notes(
    ctx: &Context,
    customer: &str,
) -> Result<(DataFile, Arc<MemoryBackend>, NotesScope<MemoryBackend>), String> {
    let owner = ctx.owner()?;
    let data = DataFile::load(&ctx.data)?;
    let backend = Arc::new(data.backend());
    let customer = RecordId::from(customer);
    let known = backend
        .list(&owner, RecordKind::Customer)
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .any(|c| c.id() == &customer);
    if !known {
        return Err(format!("customer not found: {}", customer));
    }
    let scope = NotesScope::open(Arc::clone(&backend), owner, customer)
        .await
        .map_err(|e| e.to_string())?;
    Ok((data, backend, scope))
}
