//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, db::DbCommands, dept::DeptCommands, import::ImportArgs,
    init::InitArgs, member::MemberCommands, position::PositionCommands, region::RegionCommands,
};

#[derive(Parser)]
#[command(name = "roster")]
#[command(author, version, about = "Member roster: regions, positions and the people who hold them")]
#[command(long_about = "Keep a roster of members with their region and position hierarchies, department affiliations and bulk spreadsheet imports in a local SQLite database.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Database file (default: .roster/roster.db of the enclosing project)
    #[arg(long, global = true, env = "ROSTER_DB")]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new roster project
    Init(InitArgs),

    /// Region hierarchy management
    #[command(subcommand)]
    Region(RegionCommands),

    /// Position hierarchy management
    #[command(subcommand)]
    Position(PositionCommands),

    /// Member management
    #[command(subcommand)]
    Member(MemberCommands),

    /// Department management
    #[command(subcommand)]
    Dept(DeptCommands),

    /// Import members from a CSV export of the member spreadsheet
    Import(ImportArgs),

    /// Database schema status and migration
    #[command(subcommand)]
    Db(DbCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and trees
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// JSON format (for programming)
    Json,
}
