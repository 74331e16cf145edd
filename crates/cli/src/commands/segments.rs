use serde::Serialize;
use time::OffsetDateTime;

use bizflow_model::Customer;
use bizflow_view::Segment;

use crate::args::QueryArgs;
use crate::commands::{note, open_scope};
use crate::data::DataFile;
use crate::{print_json, Context, OutputFormat, SegmentsCommands};

#[derive(Serialize)]
struct Listed<'a> {
    #[serde(flatten)]
    segment: &'a Segment,
    count: usize,
}

pub(crate) async fn cmd_segments(ctx: &Context, command: SegmentsCommands) -> Result<(), String> {
    match command {
        SegmentsCommands::List => list(ctx).await,
        SegmentsCommands::Save { name, query } => save(ctx, &name, &query),
        SegmentsCommands::Rename { id, name } => {
            let owner = ctx.owner()?;
            let mut data = DataFile::load(&ctx.data)?;
            let book = data.segments.entry(owner).or_default();
            let segment = book.rename(&id, &name).map_err(|e| e.to_string())?.clone();
            data.save(&ctx.data)?;
            emit(ctx, "renamed", &segment)
        }
        SegmentsCommands::Delete { id } => {
            let owner = ctx.owner()?;
            let mut data = DataFile::load(&ctx.data)?;
            let removed = data
                .segments
                .get_mut(&owner)
                .and_then(|book| book.delete(&id))
                .ok_or_else(|| format!("segment not found: {}", id))?;
            if data.segments.get(&owner).is_some_and(|b| b.is_empty()) {
                data.segments.remove(&owner);
            }
            data.save(&ctx.data)?;
            emit(ctx, "deleted", &removed)
        }
    }
}

async fn list(ctx: &Context) -> Result<(), String> {
    let (data, _backend, scope) = open_scope::<Customer>(ctx, ctx.config.view.page_size).await?;
    let owner = ctx.owner()?;
    let Some(book) = data.segments.get(&owner) else {
        if ctx.output == OutputFormat::Json {
            return print_json(&Vec::<Segment>::new());
        }
        note(ctx, "no saved segments");
        return Ok(());
    };
    let counts = book.counts(scope.view().store().records());
    match ctx.output {
        OutputFormat::Json => print_json(
            &counts
                .iter()
                .map(|(segment, count)| Listed {
                    segment,
                    count: *count,
                })
                .collect::<Vec<_>>(),
        ),
        OutputFormat::Text => {
            for (segment, count) in counts {
                println!("{}  {}  ({} customers)", segment.id, segment.name, count);
            }
            Ok(())
        }
    }
}

fn save(ctx: &Context, name: &str, query: &QueryArgs) -> Result<(), String> {
    let owner = ctx.owner()?;
    let mut data = DataFile::load(&ctx.data)?;
    let offset = ctx.config.utc_offset();
    let rules = query.spec(offset, data.segments.get(&owner))?;
    let book = data.segments.entry(owner).or_default();
    let segment = book
        .add(name, rules, OffsetDateTime::now_utc())
        .map_err(|e| e.to_string())?
        .clone();
    data.save(&ctx.data)?;
    emit(ctx, "saved", &segment)
}

fn emit(ctx: &Context, verb: &str, segment: &Segment) -> Result<(), String> {
    match ctx.output {
        OutputFormat::Json => print_json(segment),
        OutputFormat::Text => {
            note(ctx, format!("{} segment {} ({})", verb, segment.id, segment.name));
            Ok(())
        }
    }
}
