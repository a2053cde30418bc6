//! `roster init` command - Initialize a new roster project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::project::{Project, ProjectError};
use crate::core::Database;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    match Project::init(&path) {
        Ok(project) => {
            Database::open(&project.database_path())?;
            println!(
                "{} Initialized roster project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!(
                "{} Created database {}",
                style("✓").green(),
                style(project.database_path().display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!(
                "  {} Add a top-level region",
                style("roster region add --name <NAME>").yellow()
            );
            println!(
                "  {} Add a position",
                style("roster position add --name <NAME>").yellow()
            );
            println!(
                "  {} Import members from a spreadsheet",
                style("roster import <FILE.csv>").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} roster project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
