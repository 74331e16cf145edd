use std::path::Path;

use serde::Serialize;

use bizflow_model::{Customer, DomainRecord, Lead, Note, RecordKind, Task};
use bizflow_view::{csv, SegmentBook, ViewAction};

use crate::args::{QueryArgs, SortArgs};
use crate::commands::open_scope;
use crate::data::DataFile;
use crate::render::Line;
use crate::{print_json, Context, OutputFormat};

#[derive(Serialize)]
struct PageOutput<'a, R> {
    page: usize,
    page_count: usize,
    total: usize,
    start: usize,
    end: usize,
    items: &'a [R],
}

pub(crate) async fn cmd_query(
    ctx: &Context,
    kind: RecordKind,
    query: &QueryArgs,
    sort: &SortArgs,
    page: usize,
    page_size: Option<usize>,
) -> Result<(), String> {
    let size = page_size.unwrap_or(ctx.config.view.page_size);
    match kind {
        RecordKind::Customer => query_page::<Customer>(ctx, query, sort, page, size).await,
        RecordKind::Lead => query_page::<Lead>(ctx, query, sort, page, size).await,
        RecordKind::Task => query_page::<Task>(ctx, query, sort, page, size).await,
        RecordKind::Note => query_page::<Note>(ctx, query, sort, page, size).await,
    }
}

async fn query_page<R>(
    ctx: &Context,
    query: &QueryArgs,
    sort: &SortArgs,
    page: usize,
    page_size: usize,
) -> Result<(), String>
where
    R: DomainRecord + Line + Serialize,
{
    let (data, _backend, mut scope) = open_scope::<R>(ctx, page_size).await?;
    let spec = query.spec(ctx.config.utc_offset(), segment_book(ctx, &data))?;
    scope.apply(ViewAction::SetQuery(spec)).map_err(|e| e.to_string())?;
    scope.apply(ViewAction::SetSort(sort.spec())).map_err(|e| e.to_string())?;
    scope.apply(ViewAction::SetPage(page)).map_err(|e| e.to_string())?;

    let page = scope.view().page();
    match ctx.output {
        OutputFormat::Json => print_json(&PageOutput {
            page: page.page,
            page_count: page.page_count,
            total: page.total,
            start: page.start,
            end: page.end,
            items: page.items.as_slice(),
        }),
        OutputFormat::Text => {
            if page.total == 0 {
                println!("no matching {}s", R::KIND);
                return Ok(());
            }
            for record in &page.items {
                println!("{}", record.line());
            }
            if !ctx.quiet {
                println!(
                    "-- {}-{} of {} (page {}/{})",
                    page.start + 1,
                    page.end,
                    page.total,
                    page.page,
                    page.page_count
                );
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_export(
    ctx: &Context,
    kind: RecordKind,
    query: &QueryArgs,
    sort: &SortArgs,
    out: Option<&Path>,
) -> Result<(), String> {
    let text = match kind {
        RecordKind::Customer => export_matching::<Customer>(ctx, query, sort).await?,
        RecordKind::Lead => export_matching::<Lead>(ctx, query, sort).await?,
        RecordKind::Task => export_matching::<Task>(ctx, query, sort).await?,
        RecordKind::Note => export_matching::<Note>(ctx, query, sort).await?,
    };
    match out {
        Some(path) => {
            std::fs::write(path, text + "\n")
                .map_err(|e| format!("error writing file '{}': {}", path.display(), e))?;
            if !ctx.quiet {
                eprintln!("wrote {}", path.display());
            }
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// CSV of every record matching the query, in sort order, across all pages.
async fn export_matching<R>(ctx: &Context, query: &QueryArgs, sort: &SortArgs) -> Result<String, String>
where
    R: DomainRecord + csv::CsvRecord,
{
    let (data, _backend, mut scope) = open_scope::<R>(ctx, ctx.config.view.page_size).await?;
    let spec = query.spec(ctx.config.utc_offset(), segment_book(ctx, &data))?;
    scope.apply(ViewAction::SetQuery(spec)).map_err(|e| e.to_string())?;
    scope.apply(ViewAction::SetSort(sort.spec())).map_err(|e| e.to_string())?;
    Ok(csv::export_records(scope.view().matching()))
}

fn segment_book<'a>(ctx: &Context, data: &'a DataFile) -> Option<&'a SegmentBook> {
    ctx.owner.as_ref().and_then(|o| data.segments.get(o))
}
