pub(crate) mod board;
pub(crate) mod import;
pub(crate) mod notes;
pub(crate) mod query;
pub(crate) mod segments;
pub(crate) mod tags;

use std::sync::Arc;

use bizflow_model::DomainRecord;
use bizflow_storage::{MemoryBackend, StaticSession};
use bizflow_view::{CollectionView, OwnerScope};

use crate::data::DataFile;
use crate::{Commands, Context};

pub(crate) async fn run(command: Commands, ctx: &Context) -> Result<(), String> {
    match command {
        Commands::Query {
            kind,
            query,
            sort,
            page,
            page_size,
        } => query::cmd_query(ctx, kind, &query, &sort, page, page_size).await,
        Commands::Export {
            kind,
            query,
            sort,
            out,
        } => query::cmd_export(ctx, kind, &query, &sort, out.as_deref()).await,
        Commands::Import { file, dry_run } => import::cmd_import(ctx, &file, dry_run).await,
        Commands::Board { command } => board::cmd_board(ctx, command).await,
        Commands::Tags { command } => tags::cmd_tags(ctx, command).await,
        Commands::Segments { command } => segments::cmd_segments(ctx, command).await,
        Commands::Notes { command } => notes::cmd_notes(ctx, command).await,
    }
}

/// Load the data file and sign the `--owner` in on a scope over it.
pub(crate) async fn open_scope<R: DomainRecord>(
    ctx: &Context,
    page_size: usize,
) -> Result<(DataFile, Arc<MemoryBackend>, OwnerScope<R, MemoryBackend>), String> {
    let owner = ctx.owner()?;
    let data = DataFile::load(&ctx.data)?;
    let backend = Arc::new(data.backend());
    let view = CollectionView::new(page_size).map_err(|e| e.to_string())?;
    let mut scope = OwnerScope::new(Arc::clone(&backend), view);
    scope
        .follow(&StaticSession::signed_in(owner))
        .await
        .map_err(|e| e.to_string())?;
    Ok((data, backend, scope))
}

/// Write the backend's records back to the data file.
pub(crate) async fn persist(
    ctx: &Context,
    mut data: DataFile,
    backend: &MemoryBackend,
) -> Result<(), String> {
    data.absorb(backend).await;
    data.save(&ctx.data)
}

pub(crate) fn note(ctx: &Context, msg: impl AsRef<str>) {
    if !ctx.quiet {
        println!("{}", msg.as_ref());
    }
}
