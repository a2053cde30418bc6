//! `roster import` command - Bulk member import from CSV

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{database_path, open_database, output_format, success, warning};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::viewmodel::import::{
    preview, ImportEvent, ImportRow, ImportSummary, ImportWorker, MemberImporter, RowResult,
    RowStatus, TEMPLATE_HEADERS,
};

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV file with 姓名, 地區, 職務 and optional 電話 columns
    #[arg(required_unless_present = "template")]
    pub file: Option<PathBuf>,

    /// Check every row without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stop once this many rows have failed
    #[arg(long)]
    pub max_failures: Option<usize>,

    /// Print an empty template with the expected headers
    #[arg(long, conflicts_with_all = ["file", "dry_run"])]
    pub template: bool,
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    if args.template {
        return print_template();
    }
    let Some(file) = args.file else {
        return Err(miette::miette!("no import file given"));
    };

    let rows = preview(&file)?;
    if rows.is_empty() {
        warning(format!("{} has no data rows", file.display()));
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} {} row(s) read from {}",
            style("→").blue(),
            rows.len(),
            style(file.display()).cyan()
        );
    }

    if args.dry_run {
        return dry_run(&rows, global);
    }

    let db_path = database_path(global)?;
    // Migrate before the worker starts so schema errors surface here
    drop(open_database(global)?);

    let worker = ImportWorker::spawn(db_path, rows).into_diagnostic()?;
    let mut failures: Vec<RowResult> = Vec::new();
    let mut summary: Option<ImportSummary> = None;
    let mut aborted: Option<String> = None;
    let show_progress = !global.quiet && output_format(global) != OutputFormat::Json;

    for event in worker.events().iter() {
        match event {
            ImportEvent::Progress { done, total, result } => {
                if !result.is_success() {
                    failures.push(result.clone());
                    if args.max_failures.is_some_and(|max| failures.len() >= max) {
                        worker.stop();
                    }
                }
                if show_progress {
                    print_progress(done, total, &result);
                }
            }
            ImportEvent::Finished(s) => {
                summary = Some(s);
                break;
            }
            ImportEvent::Aborted(message) => {
                aborted = Some(message);
                break;
            }
        }
    }
    worker.join();

    if let Some(message) = aborted {
        return Err(miette::miette!("import aborted: {}", message));
    }

    let Some(summary) = summary else {
        return Err(miette::miette!("import worker exited without a summary"));
    };
    print_summary(&summary, &failures, global)
}

fn print_template() -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(TEMPLATE_HEADERS).into_diagnostic()?;
    writer.flush().into_diagnostic()?;
    eprintln!(
        "{} fill in one member per row; 電話 may be left empty",
        style("hint:").dim()
    );
    Ok(())
}

fn dry_run(rows: &[ImportRow], global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global)?;
    let importer = MemberImporter::new(&mut db)?;

    let mut bad = 0;
    for row in rows {
        if let Err(e) = importer.check_row(row) {
            bad += 1;
            println!("{} line {}: {}", style("✗").red(), row.line, e);
        }
    }

    if bad == 0 {
        success(global, format!("all {} row(s) look valid", rows.len()));
    } else {
        warning(format!("{} of {} row(s) would fail", bad, rows.len()));
    }
    Ok(())
}

fn print_progress(done: usize, total: usize, result: &RowResult) {
    let counter = style(format!("[{}/{}]", done, total)).dim();
    match &result.status {
        RowStatus::Created { member_id } => println!(
            "{} {} created {} ({})",
            counter,
            style("✓").green(),
            result.name,
            member_id
        ),
        RowStatus::Updated { member_id } => println!(
            "{} {} updated {} ({})",
            counter,
            style("✓").green(),
            result.name,
            member_id
        ),
        RowStatus::Failed { message } => println!(
            "{} {} line {} '{}': {}",
            counter,
            style("✗").red(),
            result.line,
            result.name,
            message
        ),
    }
}

fn print_summary(summary: &ImportSummary, failures: &[RowResult], global: &GlobalOpts) -> Result<()> {
    if output_format(global) == OutputFormat::Json {
        let value = serde_json::json!({
            "summary": summary,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    println!();
    println!("{}", style("Import Summary").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Rows:     {}", summary.total);
    println!("  Created:  {}", style(summary.created).green());
    println!("  Updated:  {}", style(summary.updated).green());
    if summary.failed > 0 {
        println!("  Failed:   {}", style(summary.failed).red());
    } else {
        println!("  Failed:   0");
    }
    if summary.stopped {
        warning(format!(
            "stopped after {} of {} row(s)",
            summary.processed(),
            summary.total
        ));
    }
    Ok(())
}
