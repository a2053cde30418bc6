//! `roster position` command - Position hierarchy management
//!
//! Same subcommands as regions plus sibling reordering.

use clap::Subcommand;
use miette::Result;

use crate::cli::commands::tree::{
    self, AddArgs, DeleteArgs, EditArgs, ListArgs, ParentsArgs, ShowArgs,
};
use crate::cli::helpers::{open_database, success, warning};
use crate::cli::GlobalOpts;
use crate::entities::Position;

#[derive(Subcommand, Debug)]
pub enum PositionCommands {
    /// List positions as a tree (or flat with --flat/--search)
    List(ListArgs),

    /// Show a position with its path and children
    Show(ShowArgs),

    /// Add a position (placed after its siblings)
    Add(AddArgs),

    /// Rename or move a position
    Edit(EditArgs),

    /// Delete a position without children or assigned members
    Delete(DeleteArgs),

    /// List the positions that may become the parent of a position
    Parents(ParentsArgs),

    /// Move a position one place up among its siblings
    MoveUp(MoveArgs),

    /// Move a position one place down among its siblings
    MoveDown(MoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct MoveArgs {
    pub id: i64,
}

/// Run a position subcommand
pub fn run(cmd: PositionCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PositionCommands::List(args) => tree::run_list::<Position>(args, global),
        PositionCommands::Show(args) => tree::run_show::<Position>(args, global),
        PositionCommands::Add(args) => tree::run_add::<Position>(args, global),
        PositionCommands::Edit(args) => tree::run_edit::<Position>(args, global),
        PositionCommands::Delete(args) => tree::run_delete::<Position>(args, global),
        PositionCommands::Parents(args) => tree::run_parents::<Position>(args, global),
        PositionCommands::MoveUp(args) => run_move(args, true, global),
        PositionCommands::MoveDown(args) => run_move(args, false, global),
    }
}

fn run_move(args: MoveArgs, up: bool, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let positions = db.positions();
    let moved = if up {
        positions.move_up(args.id)?
    } else {
        positions.move_down(args.id)?
    };

    let direction = if up { "up" } else { "down" };
    if moved {
        success(global, format!("Moved position {} {}", args.id, direction));
    } else {
        warning(format!(
            "position {} is already the {} sibling",
            args.id,
            if up { "first" } else { "last" }
        ));
    }
    Ok(())
}
