//! `roster member` command - Member management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{
    confirm, escape_csv, open_database, output_format, success, truncate_str, warning,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::db::{MemberFilter, MemberSort};
use crate::core::StoreError;
use crate::viewmodel::{AddPosition, MemberForm};

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// List members with their region, department and primary position
    List(ListArgs),

    /// Show a member and all assigned positions
    Show(ShowArgs),

    /// Add a member
    Add(AddArgs),

    /// Edit a member and its position assignments
    Edit(EditArgs),

    /// Delete a member and its position assignments
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Name or phone number contains this text
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Only members of this region id
    #[arg(long)]
    pub region: Option<i64>,

    /// Sort column
    #[arg(long, default_value_t = MemberSort::Name)]
    pub sort: MemberSort,

    /// Reverse the sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Member name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Phone number (unique across members)
    #[arg(long)]
    pub phone: Option<String>,

    /// Region id
    #[arg(long)]
    pub region: Option<i64>,

    /// Department id
    #[arg(long)]
    pub department: Option<i64>,

    /// Position id to assign (repeatable)
    #[arg(long = "position", short = 'p')]
    pub positions: Vec<i64>,

    /// Primary position id (defaults to the first --position)
    #[arg(long)]
    pub primary: Option<i64>,

    /// Exclude the member from scheduling
    #[arg(long)]
    pub unschedulable: bool,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    pub id: i64,

    /// New name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// New phone number (empty string clears it)
    #[arg(long)]
    pub phone: Option<String>,

    /// New region id
    #[arg(long, conflicts_with = "no_region")]
    pub region: Option<i64>,

    /// Clear the region
    #[arg(long)]
    pub no_region: bool,

    /// New department id
    #[arg(long, conflicts_with = "no_department")]
    pub department: Option<i64>,

    /// Clear the department
    #[arg(long)]
    pub no_department: bool,

    /// Position id to assign (repeatable)
    #[arg(long = "position", short = 'p')]
    pub positions: Vec<i64>,

    /// Position id to unassign (repeatable)
    #[arg(long = "remove-position")]
    pub remove_positions: Vec<i64>,

    /// Make this assigned position the primary one
    #[arg(long)]
    pub primary: Option<i64>,

    /// Include the member in scheduling
    #[arg(long, conflicts_with = "unschedulable")]
    pub schedulable: bool,

    /// Exclude the member from scheduling
    #[arg(long)]
    pub unschedulable: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    pub id: i64,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Run a member subcommand
pub fn run(cmd: MemberCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MemberCommands::List(args) => run_list(args, global),
        MemberCommands::Show(args) => run_show(args, global),
        MemberCommands::Add(args) => run_add(args, global),
        MemberCommands::Edit(args) => run_edit(args, global),
        MemberCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let filter = MemberFilter {
        search: args.search,
        region_id: args.region,
        sort: args.sort,
        descending: args.reverse,
    };
    let mut members = db.members().search(&filter)?;
    if let Some(limit) = args.limit {
        members.truncate(limit);
    }

    let format = output_format(global);
    if members.is_empty() {
        if format == OutputFormat::Json {
            println!("[]");
        } else if !global.quiet {
            println!("No members found.");
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&members).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Csv => {
            println!("id,name,phone,region,department,primary_position,schedulable");
            for m in &members {
                println!(
                    "{},{},{},{},{},{},{}",
                    m.id,
                    escape_csv(&m.name),
                    escape_csv(m.phone_number.as_deref().unwrap_or("")),
                    escape_csv(m.region.as_deref().unwrap_or("")),
                    escape_csv(m.department.as_deref().unwrap_or("")),
                    escape_csv(m.primary_position.as_deref().unwrap_or("")),
                    m.is_schedulable
                );
            }
        }
        OutputFormat::Tsv => {
            for m in &members {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    m.id,
                    m.name,
                    m.phone_number.as_deref().unwrap_or(""),
                    m.region.as_deref().unwrap_or(""),
                    m.department.as_deref().unwrap_or(""),
                    m.primary_position.as_deref().unwrap_or(""),
                    m.is_schedulable
                );
            }
        }
        OutputFormat::Auto => {
            let mut builder = Builder::default();
            builder.push_record(["ID", "Name", "Phone", "Region", "Department", "Primary", "Sched"]);
            for m in &members {
                builder.push_record([
                    m.id.to_string(),
                    truncate_str(&m.name, 24),
                    m.phone_number.clone().unwrap_or_else(|| "-".to_string()),
                    m.region.clone().unwrap_or_else(|| "-".to_string()),
                    m.department.clone().unwrap_or_else(|| "-".to_string()),
                    m.primary_position.clone().unwrap_or_else(|| "-".to_string()),
                    if m.is_schedulable { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{}", builder.build().with(Style::sharp()));
            if !global.quiet {
                println!("{} member(s)", style(members.len()).cyan());
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let member = db.members().require(args.id)?;
    let positions = db.assignments().for_member(args.id)?;

    if output_format(global) == OutputFormat::Json {
        let value = serde_json::json!({
            "member": member,
            "positions": positions,
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    let region = match member.region_id {
        Some(id) => db.regions().path_label(id)?,
        None => "-".to_string(),
    };
    let department = match member.department_id {
        Some(id) => db
            .departments()
            .get(id)?
            .map(|d| d.name)
            .unwrap_or_else(|| format!("#{}", id)),
        None => "-".to_string(),
    };

    println!("{}: {}", style("ID").bold(), member.id);
    println!("{}: {}", style("Name").bold(), member.name);
    println!(
        "{}: {}",
        style("Phone").bold(),
        member.phone_number.as_deref().unwrap_or("-")
    );
    println!("{}: {}", style("Region").bold(), region);
    println!("{}: {}", style("Department").bold(), department);
    println!(
        "{}: {}",
        style("Schedulable").bold(),
        if member.is_schedulable { "yes" } else { "no" }
    );
    if positions.is_empty() {
        println!("{}: {}", style("Positions").bold(), style("none").dim());
    } else {
        println!("{}:", style("Positions").bold());
        for p in &positions {
            let marker = if p.is_primary {
                style("(primary)").green().to_string()
            } else {
                String::new()
            };
            println!("  {} {} {}", style(p.position_id).cyan(), p.name, marker);
        }
    }
    Ok(())
}

/// Region and department ids must be among the form's option lists
fn check_references(form: &MemberForm<'_>, region: Option<i64>, department: Option<i64>) -> Result<()> {
    if let Some(id) = region {
        if !form.regions()?.iter().any(|r| r.id == id) {
            return Err(StoreError::not_found("region", id).into());
        }
    }
    if let Some(id) = department {
        if !form.departments()?.iter().any(|d| d.id == id) {
            return Err(StoreError::not_found("department", id).into());
        }
    }
    Ok(())
}

fn stage_position(form: &mut MemberForm<'_>, position_id: i64, is_primary: bool) -> Result<()> {
    match form.add_position(position_id, is_primary)? {
        AddPosition::Added => {}
        AddPosition::AlreadyAssigned => {
            warning(format!("position {} is already assigned", position_id));
            if is_primary {
                form.set_primary_position(position_id);
            }
        }
        AddPosition::UnknownPosition => {
            warning(format!("position {} does not exist, skipped", position_id));
        }
    }
    Ok(())
}

fn print_saved(global: &GlobalOpts, verb: &str, id: i64, form: &MemberForm<'_>) {
    if global.quiet {
        println!("{}", id);
        return;
    }
    success(
        global,
        format!("{} member {} '{}'", verb, style(id).cyan(), form.draft.name),
    );
    if let Some(primary) = form.primary_position() {
        println!("  primary position: {}", primary.name);
    }
    let others: Vec<&str> = form
        .staged()
        .iter()
        .filter(|s| !s.is_primary)
        .map(|s| s.name.as_str())
        .collect();
    if !others.is_empty() {
        println!("  other positions: {}", others.join(", "));
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global)?;
    let mut form = MemberForm::add(&mut db);
    check_references(&form, args.region, args.department)?;

    form.draft.name = args.name;
    form.draft.phone_number = args.phone;
    form.draft.region_id = args.region;
    form.draft.department_id = args.department;
    form.draft.is_schedulable = !args.unschedulable;

    let primary = args.primary.or_else(|| args.positions.first().copied());
    for position_id in &args.positions {
        stage_position(&mut form, *position_id, Some(*position_id) == primary)?;
    }
    if let Some(primary) = args.primary {
        if !args.positions.contains(&primary) {
            stage_position(&mut form, primary, true)?;
        }
    }

    let id = form.save()?;
    print_saved(global, "Added", id, &form);
    Ok(())
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global)?;
    let mut form = MemberForm::edit(&mut db, args.id)?;
    check_references(&form, args.region, args.department)?;

    if let Some(name) = args.name {
        form.draft.name = name;
    }
    if let Some(phone) = args.phone {
        form.draft.phone_number = Some(phone);
    }
    if args.no_region {
        form.draft.region_id = None;
    } else if args.region.is_some() {
        form.draft.region_id = args.region;
    }
    if args.no_department {
        form.draft.department_id = None;
    } else if args.department.is_some() {
        form.draft.department_id = args.department;
    }
    if args.schedulable {
        form.draft.is_schedulable = true;
    } else if args.unschedulable {
        form.draft.is_schedulable = false;
    }

    for position_id in &args.remove_positions {
        if !form.remove_position(*position_id) {
            warning(format!("position {} is not assigned", position_id));
        }
    }
    for position_id in &args.positions {
        stage_position(&mut form, *position_id, false)?;
    }
    if let Some(primary) = args.primary {
        if form.staged().iter().any(|s| s.position_id == primary) {
            form.set_primary_position(primary);
        } else {
            stage_position(&mut form, primary, true)?;
        }
    }

    let id = form.save()?;
    print_saved(global, "Updated", id, &form);
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let db = open_database(global)?;
    let member = db.members().require(args.id)?;

    if !confirm(&format!("Delete member '{}'?", member.name), args.yes)? {
        println!("Aborted.");
        return Ok(());
    }

    db.members().delete(args.id)?;
    success(global, format!("Deleted member {} '{}'", args.id, member.name));
    Ok(())
}
