use std::path::Path;

use bizflow_view::csv;

use crate::commands::persist;
use crate::data::DataFile;
use crate::{print_json, Context, OutputFormat};

pub(crate) async fn cmd_import(ctx: &Context, file: &Path, dry_run: bool) -> Result<(), String> {
    let owner = ctx.owner()?;
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("error reading file '{}': {}", file.display(), e))?;
    let report = csv::parse_customers(&text);
    if report.missing_columns {
        return Err(format!(
            "'{}' has no name and email columns in its header",
            file.display()
        ));
    }

    if dry_run {
        return match ctx.output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "parsed": report.parsed(),
                "skipped": report.skipped,
                "rows": report.rows,
            })),
            OutputFormat::Text => {
                for row in &report.rows {
                    println!("{} <{}>", row.name, row.email);
                }
                println!("{} rows parsed, {} skipped", report.parsed(), report.skipped);
                Ok(())
            }
        };
    }

    let data = DataFile::load(&ctx.data)?;
    let backend = data.backend();
    let (created, failed) = csv::create_customers(&backend, &owner, report.rows).await;
    persist(ctx, data, &backend).await?;

    match ctx.output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "created": created,
            "skipped": report.skipped,
            "failed": failed
                .iter()
                .map(|(row, err)| serde_json::json!({ "row": row, "error": err.to_string() }))
                .collect::<Vec<_>>(),
        }))?,
        OutputFormat::Text => {
            println!(
                "imported {} customers ({} skipped, {} failed)",
                created.len(),
                report.skipped,
                failed.len()
            );
            for (row, err) in &failed {
                eprintln!("  row {}: {}", row + 1, err);
            }
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} rows could not be created", failed.len()))
    }
}
