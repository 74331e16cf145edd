use serde::Serialize;

use bizflow_model::{Lead, RecordId, RecordKind, Stage, Staged, Task};
use bizflow_storage::{MemoryBackend, RecordStorage};
use bizflow_view::{Board, LeadTotals};

use crate::commands::{note, persist};
use crate::data::DataFile;
use crate::render::Line;
use crate::{print_json, BoardCommands, Context, OutputFormat, Pipeline};

#[derive(Serialize)]
struct Column<'a, R> {
    stage: &'static str,
    records: &'a [R],
}

#[derive(Serialize)]
struct BoardOutput<'a, R> {
    columns: Vec<Column<'a, R>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    totals: Option<LeadTotals>,
}

pub(crate) async fn cmd_board(ctx: &Context, command: BoardCommands) -> Result<(), String> {
    match command {
        BoardCommands::Show {
            pipeline: Pipeline::Leads,
            ..
        } => {
            let (_, _, board) = load_board::<Lead>(ctx, |_| true).await?;
            show(ctx, &board, Some(board.totals()))
        }
        BoardCommands::Show {
            pipeline: Pipeline::Tasks,
            project,
        } => {
            let keep = |t: &Task| match &project {
                Some(p) => t.project_id.as_deref() == Some(p.as_str()),
                None => true,
            };
            let (_, _, board) = load_board::<Task>(ctx, keep).await?;
            show(ctx, &board, None)
        }
        BoardCommands::Move {
            pipeline,
            id,
            from,
            to,
        } => match pipeline {
            Pipeline::Leads => move_card::<Lead>(ctx, &id, &from, &to).await,
            Pipeline::Tasks => move_card::<Task>(ctx, &id, &from, &to).await,
        },
        BoardCommands::Clear { pipeline, stage } => match pipeline {
            Pipeline::Leads => clear::<Lead>(ctx, &stage).await,
            Pipeline::Tasks => clear::<Task>(ctx, &stage).await,
        },
    }
}

async fn load_board<R: Staged>(
    ctx: &Context,
    keep: impl Fn(&R) -> bool,
) -> Result<(DataFile, MemoryBackend, Board<R>), String> {
    let owner = ctx.owner()?;
    let data = DataFile::load(&ctx.data)?;
    let backend = data.backend();
    let records = backend
        .list(&owner, R::KIND)
        .await
        .map_err(|e| e.to_string())?;
    let placement = match R::KIND {
        RecordKind::Lead => ctx.config.board.lead_placement,
        _ => ctx.config.board.task_placement,
    };
    let board = Board::new(
        records
            .into_iter()
            .filter_map(R::from_record)
            .filter(|r| keep(r)),
        placement,
    );
    Ok((data, backend, board))
}

fn show<R>(ctx: &Context, board: &Board<R>, totals: Option<LeadTotals>) -> Result<(), String>
where
    R: Staged + Line + Serialize,
{
    if ctx.output == OutputFormat::Json {
        return print_json(&BoardOutput {
            columns: board
                .columns()
                .map(|(stage, records)| Column {
                    stage: stage.as_str(),
                    records,
                })
                .collect(),
            totals,
        });
    }

    for (stage, records) in board.columns() {
        let amount = totals
            .as_ref()
            .and_then(|t| t.stages.iter().find(|s| s.stage.as_str() == stage.as_str()))
            .map(|s| format!("  ${}", s.amount))
            .unwrap_or_default();
        println!("{} ({}){}", stage.as_str().to_uppercase(), records.len(), amount);
        for record in records {
            println!("  {}", record.line());
        }
    }
    if let Some(totals) = totals {
        println!("open pipeline: ${}  total: ${}", totals.open_total, totals.total);
    }
    Ok(())
}

async fn move_card<R: Staged>(ctx: &Context, id: &str, from: &str, to: &str) -> Result<(), String> {
    let (data, backend, mut board) = load_board::<R>(ctx, |_| true).await?;
    let id = RecordId::from(id);
    let moved = board
        .move_by_name(&backend, &id, from, to)
        .await
        .map_err(|e| e.to_string())?;
    match moved {
        Some(m) => {
            persist(ctx, data, &backend).await?;
            match ctx.output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "moved": true,
                    "id": m.id,
                    "from": m.from.as_str(),
                    "to": m.to.as_str(),
                })),
                OutputFormat::Text => {
                    note(ctx, format!("moved {}", m));
                    Ok(())
                }
            }
        }
        None => match ctx.output {
            OutputFormat::Json => print_json(&serde_json::json!({ "moved": false, "id": id })),
            OutputFormat::Text => {
                note(ctx, format!("{} already in {}", id, to.trim()));
                Ok(())
            }
        },
    }
}

async fn clear<R: Staged>(ctx: &Context, stage: &str) -> Result<(), String> {
    let stage = R::Stage::parse(stage).map_err(|e| e.to_string())?;
    let (data, backend, mut board) = load_board::<R>(ctx, |_| true).await?;
    let report = board.clear_stage(&backend, stage).await;
    persist(ctx, data, &backend).await?;
    match ctx.output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "stage": stage.as_str(),
            "deleted": report.succeeded,
            "failed": report.failed.len(),
        }))?,
        OutputFormat::Text => note(ctx, format!("{}: {}", stage, report)),
    }
    if report.is_clean() {
        Ok(())
    } else {
        Err(format!("{} deletes failed", report.failed.len()))
    }
}
