//! Subcommands shared by `roster region` and `roster position`
//!
//! Both trees are handled by the same generic code; the per-kind modules
//! only declare their subcommand enums and dispatch here.

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{confirm, escape_csv, open_database, opt_id, output_format, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::db::{build_forest, TreeItem, TreeRepository};
use crate::core::StoreError;
use crate::entities::TreeNode;
use crate::viewmodel::TreeNodeForm;

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only nodes whose name contains this text
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Print a flat list instead of a tree
    #[arg(long)]
    pub flat: bool,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Name (unique among siblings)
    #[arg(long, short = 'n')]
    pub name: String,

    /// Parent id (omit for a top-level node)
    #[arg(long, short = 'p')]
    pub parent: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    pub id: i64,

    /// New name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// New parent id
    #[arg(long, short = 'p', conflicts_with = "root")]
    pub parent: Option<i64>,

    /// Move to the top level
    #[arg(long)]
    pub root: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    pub id: i64,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct ParentsArgs {
    /// Node being edited (omit for a new node)
    pub id: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(Serialize)]
struct FlatRow<'a> {
    id: i64,
    name: &'a str,
    parent_id: Option<i64>,
    path: String,
}

fn print_flat<N: TreeNode>(
    repo: &TreeRepository<'_, N>,
    nodes: &[N],
    format: OutputFormat,
) -> Result<()> {
    let rows = nodes
        .iter()
        .map(|n| {
            Ok(FlatRow {
                id: n.id(),
                name: n.name(),
                parent_id: n.parent_id(),
                path: repo.path_label(n.id())?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Csv => {
            println!("id,name,parent_id,path");
            for row in &rows {
                println!(
                    "{},{},{},{}",
                    row.id,
                    escape_csv(row.name),
                    row.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                    escape_csv(&row.path)
                );
            }
        }
        OutputFormat::Tsv => {
            for row in &rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    row.id,
                    row.name,
                    row.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                    row.path
                );
            }
        }
        OutputFormat::Auto => {
            println!(
                "{:<6} {:<8} {}",
                style("ID").bold(),
                style("PARENT").bold(),
                style("PATH").bold()
            );
            println!("{}", "-".repeat(50));
            for row in &rows {
                println!(
                    "{:<6} {:<8} {}",
                    style(row.id).cyan(),
                    opt_id(row.parent_id),
                    row.path
                );
            }
        }
    }
    Ok(())
}

fn print_tree<N: TreeNode>(items: &[TreeItem<N>], prefix: &str) {
    for (i, item) in items.iter().enumerate() {
        let last = i + 1 == items.len();
        let branch = if last { "└── " } else { "├── " };
        println!(
            "{}{}{} {}",
            prefix,
            branch,
            item.node.name(),
            style(format!("[{}]", item.node.id())).dim()
        );
        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        print_tree(&item.children, &child_prefix);
    }
}

pub fn run_list<N: TreeNode + Serialize>(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let repo = TreeRepository::<N>::new(db.conn());
    let format = output_format(global);

    let nodes = match args.search {
        Some(ref term) => repo.search(term)?,
        None => repo.all_sorted()?,
    };

    if nodes.is_empty() {
        if !global.quiet {
            println!("No {}s found.", N::KIND);
        }
        return Ok(());
    }

    // A search result is not a closed tree, so it is always listed flat
    if args.flat || args.search.is_some() || format != OutputFormat::Auto {
        if format == OutputFormat::Json && !args.flat && args.search.is_none() {
            let json = serde_json::to_string_pretty(&build_forest(nodes)).into_diagnostic()?;
            println!("{}", json);
            return Ok(());
        }
        return print_flat(&repo, &nodes, format);
    }

    let count = nodes.len();
    print_tree(&build_forest(nodes), "");
    if !global.quiet {
        println!();
        println!("{} {}(s)", style(count).cyan(), N::KIND);
    }
    Ok(())
}

pub fn run_show<N: TreeNode + Serialize>(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let repo = TreeRepository::<N>::new(db.conn());
    let item = repo
        .get_by_id_with_children(args.id)?
        .ok_or_else(|| StoreError::not_found(N::KIND, args.id))?;

    if output_format(global) == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&item).into_diagnostic()?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}: {}", style("ID").bold(), item.node.id());
    println!("{}: {}", style("Name").bold(), item.node.name());
    println!("{}: {}", style("Path").bold(), repo.path_label(args.id)?);
    match item.node.parent_id() {
        Some(parent) => println!("{}: {}", style("Parent").bold(), parent),
        None => println!("{}: {}", style("Parent").bold(), style("(top level)").dim()),
    }
    if item.children.is_empty() {
        println!("{}: {}", style("Children").bold(), style("none").dim());
    } else {
        println!("{}:", style("Children").bold());
        for child in &item.children {
            println!("  {} {}", style(child.node.id()).cyan(), child.node.name());
        }
    }
    Ok(())
}

pub fn run_parents<N: TreeNode>(args: ParentsArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let repo = TreeRepository::<N>::new(db.conn());
    if let Some(id) = args.id {
        repo.require(id)?;
    }
    let parents = repo.get_possible_parents(args.id)?;
    print_flat(&repo, &parents, output_format(global))
}

pub fn run_add<N: TreeNode>(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global)?;
    if let Some(parent) = args.parent {
        TreeRepository::<N>::new(db.conn()).require(parent)?;
    }

    let mut form = TreeNodeForm::<N>::add(&mut db, args.parent);
    form.name = args.name;
    let id = form.save()?;

    if global.quiet {
        println!("{}", id);
    } else {
        success(
            global,
            format!("Added {} {} '{}'", N::KIND, style(id).cyan(), form.name),
        );
    }
    Ok(())
}

pub fn run_edit<N: TreeNode>(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global)?;
    let mut form = TreeNodeForm::<N>::edit(&mut db, args.id)?;

    if let Some(name) = args.name {
        form.name = name;
    }
    if args.root {
        form.parent_id = None;
    } else if let Some(parent) = args.parent {
        if !form.is_valid_parent(parent)? {
            return Err(miette::miette!(
                help = format!("see `roster {} parents {}` for the allowed parents", N::KIND, args.id),
                "{} {} is not a valid parent for {} {}",
                N::KIND,
                parent,
                N::KIND,
                args.id
            ));
        }
        form.parent_id = Some(parent);
    }

    let id = form.save()?;
    success(global, format!("Updated {} {} '{}'", N::KIND, style(id).cyan(), form.name));
    Ok(())
}

pub fn run_delete<N: TreeNode>(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let repo = TreeRepository::<N>::new(db.conn());
    let node = repo.require(args.id)?;

    if !confirm(&format!("Delete {} '{}'?", N::KIND, node.name()), args.yes)? {
        println!("Aborted.");
        return Ok(());
    }

    repo.delete(args.id)?;
    success(global, format!("Deleted {} {} '{}'", N::KIND, args.id, node.name()));
    Ok(())
}
