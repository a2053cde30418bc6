//! `roster db` command - Schema status and migration

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{database_path, output_format, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Database;

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Show the database path and schema version
    Status,

    /// Apply pending schema migrations
    Migrate,
}

pub fn run(cmd: DbCommands, global: &GlobalOpts) -> Result<()> {
    let path = database_path(global)?;
    match cmd {
        DbCommands::Status => {
            let exists = path.exists();
            let status = if exists {
                Some(Database::open_unmigrated(&path)?.schema_status()?)
            } else {
                None
            };

            if output_format(global) == OutputFormat::Json {
                let value = serde_json::json!({
                    "path": path,
                    "exists": exists,
                    "version": status.map(|s| s.current),
                    "target": crate::core::db::CURRENT_SCHEMA_VERSION,
                    "pending": status.map(|s| s.pending()),
                });
                println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
                return Ok(());
            }

            println!("{}: {}", style("Database").bold(), path.display());
            match status {
                None => println!(
                    "{}: {}",
                    style("Schema").bold(),
                    style("not created yet").dim()
                ),
                Some(s) if s.is_current() => println!(
                    "{}: v{} {}",
                    style("Schema").bold(),
                    s.current,
                    style("(up to date)").green()
                ),
                Some(s) => println!(
                    "{}: v{} {}",
                    style("Schema").bold(),
                    s.current,
                    style(format!("({} migration(s) pending, run `roster db migrate`)", s.pending())).yellow()
                ),
            }
        }
        DbCommands::Migrate => {
            let mut db = Database::open_unmigrated(&path)?;
            let applied = db.migrate()?;
            let status = db.schema_status()?;
            if applied == 0 {
                success(global, format!("Schema already at v{}", status.current));
            } else {
                success(
                    global,
                    format!("Applied {} migration(s), schema now at v{}", applied, status.current),
                );
            }
        }
    }
    Ok(())
}
