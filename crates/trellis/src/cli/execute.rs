//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;

use super::args::{
    EditArgs, GroupArgs, InfoArgs, InitArgs, LinkArgs, ListArgs, MoveArgs, NewArgs, SearchArgs,
    ShowArgs, StartArgs,
};
use super::validators::parse_ticket_number;
use crate::app::App;
use crate::domain::{
    GroupPath, NewLink, NewTicket, RelationshipKind, TicketNumber, TicketStatus, TicketUpdate,
};
use crate::output::{self, OutputConfig, OutputMode};
use crate::query::{GroupScope, Pattern, Predicate, Query, TextField};
use crate::store::TicketStore;

/// Turn a ticket selector into a number.
///
/// A selector is a ticket number (`12` or `#12`) or text that must identify
/// exactly one ticket.
pub(crate) fn resolve_ticket(store: &TicketStore, selector: &str) -> Result<TicketNumber> {
    if let Ok(number) = parse_ticket_number(selector) {
        return Ok(store.ticket(number)?.number);
    }
    let query = Query::new().text(TextField::Any, Pattern::Literal(selector.trim().to_string()));
    Ok(store.search_one(&query)?.number)
}

/// Build a query from the shared search flags.
pub(crate) fn build_query(search: &SearchArgs) -> Query {
    let mut query = Query::new();

    if !search.status.is_empty() {
        let statuses = search.status.iter().map(|s| TicketStatus::from(*s)).collect();
        query = query.with(Predicate::StatusIn(statuses));
    }
    if !search.not_status.is_empty() {
        let statuses = search.not_status.iter().map(|s| TicketStatus::from(*s)).collect();
        query = query.with(Predicate::Not(Box::new(Predicate::StatusIn(statuses))));
    }
    if let Some(work_type) = search.work_type {
        query = query.with(Predicate::WorkType(work_type.into()));
    }
    if let Some(group) = &search.group {
        let scope = if search.immediate {
            GroupScope::Immediate
        } else {
            GroupScope::Recursive
        };
        query = query.in_group(group.clone(), scope);
    }
    if let Some(text) = &search.grep {
        let pattern = if search.regex {
            Pattern::Regex(text.clone())
        } else {
            Pattern::Literal(text.clone())
        };
        query = query.text(search.field.into(), pattern);
    }
    if search.linked_to.is_some() || search.kind.is_some() {
        query = query.with(Predicate::Relationship {
            kind: search.kind.map(RelationshipKind::from),
            other: search.linked_to,
            direction: None,
        });
    }
    query
}

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir, args.tickets_dir.as_deref()).await?;

    if !args.quiet {
        let config = OutputConfig::from_env();
        println!(
            "{} {}",
            output::success("Initialized trellis in", &config),
            result.trellis_dir.display()
        );
        println!("  Config:  {}", result.config_file.display());
        println!("  Tickets: {}", result.tickets_dir.display());
    }

    Ok(())
}

/// Execute the info command
pub async fn execute_info(app: &App, _args: &InfoArgs, output_mode: OutputMode) -> Result<()> {
    let store = app.store();
    let (todo, started, stopped, done, other) =
        store
            .tickets()
            .fold((0, 0, 0, 0, 0), |(t, s, p, d, o), ticket| match ticket.status() {
                TicketStatus::Todo => (t + 1, s, p, d, o),
                TicketStatus::Started => (t, s + 1, p, d, o),
                TicketStatus::Stopped => (t, s, p + 1, d, o),
                TicketStatus::Done => (t, s, p, d + 1, o),
                TicketStatus::Other(_) => (t, s, p, d, o + 1),
            });
    let groups = store.groups().count();

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "root": app.root_dir().display().to_string(),
                "tickets_dir": store.root().display().to_string(),
                "version_control": app.has_vcs(),
                "auto_commit": app.config().auto_commit,
                "next_number": store.next_number().ok(),
                "groups": groups,
                "warnings": store.warnings().len(),
                "tickets": {
                    "total": store.len(),
                    "todo": todo,
                    "started": started,
                    "stopped": stopped,
                    "done": done,
                    "other": other,
                }
            }))?;
        }
        OutputMode::Text => {
            println!("Trellis Repository Information");
            println!("==============================");
            println!();
            println!("Root:        {}", app.root_dir().display());
            println!("Tickets:     {}", store.root().display());
            println!(
                "Git:         {}",
                if app.has_vcs() { "yes" } else { "no" }
            );
            match store.next_number() {
                Ok(next) => println!("Next number: #{next}"),
                Err(_) => println!("Next number: none left"),
            }
            println!();
            println!(
                "Tickets: {} total ({todo} todo, {started} started, {stopped} stopped, {done} done{})",
                store.len(),
                if other > 0 {
                    format!(", {other} other")
                } else {
                    String::new()
                }
            );
            println!("Groups:  {groups}");
            if !store.warnings().is_empty() {
                println!("Warnings: {}", store.warnings().len());
            }
        }
    }

    Ok(())
}

/// Execute the new command
pub async fn execute_new(app: &mut App, args: &NewArgs, output_mode: OutputMode) -> Result<()> {
    let links = args
        .link
        .iter()
        .map(|(kind, target)| {
            if args.both {
                NewLink::reciprocal(*target, kind.clone())
            } else {
                NewLink::new(*target, kind.clone())
            }
        })
        .collect();

    let new_ticket = NewTicket {
        title: args.title.clone(),
        slug: args.slug.clone(),
        description: args.description.clone().unwrap_or_default(),
        status: args.status.into(),
        work_type: args.work_type.map(Into::into),
        group: args.group.clone().unwrap_or_default(),
        links,
        ..NewTicket::default()
    };

    let ticket = app.store_mut().create(new_ticket).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&ticket)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} #{} {}",
                output::success("Created ticket", &config),
                ticket.number,
                ticket.path.display()
            );
        }
    }

    Ok(())
}

/// Execute the list command
pub async fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let mut query = build_query(&args.search).order_by(args.sort.into());
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let tickets = app.store().search(&query)?;
    output::print_tickets(&tickets, output_mode)?;

    Ok(())
}

/// Execute the show command
pub async fn execute_show(app: &App, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    let store = app.store();
    let number = resolve_ticket(store, &args.ticket)?;

    let details = output::TicketDetails {
        ticket: store.ticket(number)?,
        related: store.relationships_of(number)?,
        blocked_by: store.blockers(number)?,
        blocking: store.dependents(number)?,
    };
    output::print_ticket_details(&details, output_mode)?;

    Ok(())
}

/// Execute the edit command
pub async fn execute_edit(app: &mut App, args: &EditArgs, output_mode: OutputMode) -> Result<()> {
    let number = resolve_ticket(app.store(), &args.ticket)?;

    let update = TicketUpdate {
        title: args.title.clone(),
        status: args.status.map(Into::into),
        work_type: if args.clear_type {
            Some(None)
        } else {
            args.work_type.map(|t| Some(t.into()))
        },
        description: args.description.clone(),
        ..TicketUpdate::default()
    };
    if update.is_empty() {
        anyhow::bail!(
            "Nothing to change. Pass at least one of --title, --status, --type, --clear-type or --description"
        );
    }

    let ticket = app.store_mut().edit(number, &update).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&ticket)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!("{} #{}", output::success("Updated ticket", &config), ticket.number);
        }
    }

    Ok(())
}

/// Execute the link command
pub async fn execute_link(app: &mut App, args: &LinkArgs, output_mode: OutputMode) -> Result<()> {
    let kind = RelationshipKind::from(args.kind);
    let changed = app
        .store_mut()
        .link(args.source, args.target, kind.clone(), args.both)
        .await?;

    print_link_result(args, &kind, changed, "Linked", "Already linked", output_mode)
}

/// Execute the unlink command
pub async fn execute_unlink(
    app: &mut App,
    args: &LinkArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let kind = RelationshipKind::from(args.kind);
    let changed = app
        .store_mut()
        .unlink(args.source, args.target, &kind, args.both)
        .await?;

    print_link_result(args, &kind, changed, "Unlinked", "Not linked", output_mode)
}

fn print_link_result(
    args: &LinkArgs,
    kind: &RelationshipKind,
    changed: bool,
    done: &str,
    unchanged: &str,
    output_mode: OutputMode,
) -> Result<()> {
    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "source": args.source,
                "target": args.target,
                "kind": kind.as_str(),
                "bidirectional": args.both,
                "changed": changed,
            }))?;
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let label = if changed {
                output::success(done, &config)
            } else {
                output::warning(unchanged, &config)
            };
            println!("{label}: #{} {} #{}", args.source, kind.as_str(), args.target);
        }
    }
    Ok(())
}

/// Execute the move command
pub async fn execute_move(app: &mut App, args: &MoveArgs, output_mode: OutputMode) -> Result<()> {
    let number = resolve_ticket(app.store(), &args.ticket)?;
    let ticket = app.store_mut().move_ticket(number, &args.group).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&ticket)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} #{} to {}",
                output::success("Moved ticket", &config),
                ticket.number,
                ticket.path.display()
            );
        }
    }

    Ok(())
}

/// Execute the group command
pub async fn execute_group(app: &mut App, args: &GroupArgs, output_mode: OutputMode) -> Result<()> {
    let Some(path) = &args.path else {
        let store = app.store();
        let groups: Vec<(&GroupPath, Option<TicketNumber>)> = store
            .groups()
            .map(|group| (group, store.group_ticket(group).map(|t| t.number)))
            .collect();
        output::print_groups(&groups, output_mode)?;
        return Ok(());
    };

    let created = app.store_mut().create_group(path).await?;

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "path": path.to_string(),
                "created": created,
            }))?;
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            if created {
                println!("{} {path}", output::success("Created group", &config));
            } else {
                println!("{} {path}", output::info("Group already exists:", &config));
            }
        }
    }

    Ok(())
}

/// Execute the start command
pub async fn execute_start(app: &mut App, args: &StartArgs, output_mode: OutputMode) -> Result<()> {
    let number = resolve_ticket(app.store(), &args.ticket)?;
    let ticket = app.store_mut().start(number).await?;
    let branch = format!("{}{}", app.config().branch_prefix, ticket.branch_name());

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "ticket": ticket,
                "branch": branch,
            }))?;
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} #{} on branch {branch}",
                output::success("Started ticket", &config),
                ticket.number
            );
        }
    }

    Ok(())
}
