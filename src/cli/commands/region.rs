//! `roster region` command - Region hierarchy management

use clap::Subcommand;
use miette::Result;

use crate::cli::commands::tree::{
    self, AddArgs, DeleteArgs, EditArgs, ListArgs, ParentsArgs, ShowArgs,
};
use crate::cli::GlobalOpts;
use crate::entities::Region;

#[derive(Subcommand, Debug)]
pub enum RegionCommands {
    /// List regions as a tree (or flat with --flat/--search)
    List(ListArgs),

    /// Show a region with its path and children
    Show(ShowArgs),

    /// Add a region
    Add(AddArgs),

    /// Rename or move a region
    Edit(EditArgs),

    /// Delete a region without children or members
    Delete(DeleteArgs),

    /// List the regions that may become the parent of a region
    Parents(ParentsArgs),
}

/// Run a region subcommand
pub fn run(cmd: RegionCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RegionCommands::List(args) => tree::run_list::<Region>(args, global),
        RegionCommands::Show(args) => tree::run_show::<Region>(args, global),
        RegionCommands::Add(args) => tree::run_add::<Region>(args, global),
        RegionCommands::Edit(args) => tree::run_edit::<Region>(args, global),
        RegionCommands::Delete(args) => tree::run_delete::<Region>(args, global),
        RegionCommands::Parents(args) => tree::run_parents::<Region>(args, global),
    }
}
