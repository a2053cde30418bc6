//! `roster dept` command - Department management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{confirm, escape_csv, open_database, output_format, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::StoreError;

#[derive(Subcommand, Debug)]
pub enum DeptCommands {
    /// List departments
    List,

    /// Add a department
    Add {
        /// Department name (unique)
        name: String,
    },

    /// Rename a department
    Rename {
        id: i64,
        /// New name
        name: String,
    },

    /// Delete a department no member belongs to
    Delete {
        id: i64,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Run a department subcommand
pub fn run(cmd: DeptCommands, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let departments = db.departments();

    match cmd {
        DeptCommands::List => {
            let all = departments.all()?;
            match output_format(global) {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&all).into_diagnostic()?);
                }
                OutputFormat::Csv => {
                    println!("id,name");
                    for d in &all {
                        println!("{},{}", d.id, escape_csv(&d.name));
                    }
                }
                OutputFormat::Tsv => {
                    for d in &all {
                        println!("{}\t{}", d.id, d.name);
                    }
                }
                OutputFormat::Auto => {
                    if all.is_empty() {
                        println!("No departments found.");
                    }
                    for d in &all {
                        println!("{:<6} {}", style(d.id).cyan(), d.name);
                    }
                }
            }
        }
        DeptCommands::Add { name } => {
            let id = departments.add(&name)?;
            if global.quiet {
                println!("{}", id);
            } else {
                success(
                    global,
                    format!("Added department {} '{}'", style(id).cyan(), name.trim()),
                );
            }
        }
        DeptCommands::Rename { id, name } => {
            departments.rename(id, &name)?;
            success(global, format!("Renamed department {} to '{}'", id, name.trim()));
        }
        DeptCommands::Delete { id, yes } => {
            let dept = departments
                .get(id)?
                .ok_or_else(|| StoreError::not_found("department", id))?;
            if !confirm(&format!("Delete department '{}'?", dept.name), yes)? {
                println!("Aborted.");
                return Ok(());
            }
            departments.delete(id)?;
            success(global, format!("Deleted department {} '{}'", id, dept.name));
        }
    }
    Ok(())
}
