//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for trellis using clap's derive API.
//!
//! # Commands
//!
//! - `init`: Initialize a new trellis repository
//! - `new`: Create a ticket
//! - `list`: Search tickets
//! - `show`: Show one ticket with its relationships
//! - `edit`: Change a ticket's title, status, type or description
//! - `link` / `unlink`: Add or remove a relationship
//! - `move`: Move a ticket (or a whole group) to another group
//! - `group`: Create or list groups
//! - `start`: Create the ticket's branch and mark it started
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! trellis new "Fix login" --group mvp --type bug
//! trellis link 2 blocked-by 1 --both
//! trellis list --status todo,started --group mvp
//! trellis start "fix login"
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::App;
use crate::output;

pub use args::{
    EditArgs, GroupArgs, InfoArgs, InitArgs, LinkArgs, ListArgs, MoveArgs, NewArgs, SearchArgs,
    ShowArgs, StartArgs,
};

pub use types::{RelationshipKindArg, SortOrderArg, StatusArg, TextFieldArg, WorkTypeArg};

pub use validators::{parse_group, parse_link, parse_ticket_number, validate_slug, validate_title};

/// Trellis - plaintext tickets in a version-controlled directory tree
///
/// Each ticket is a markdown file named `<number>-<slug>.md`. Directories
/// group tickets, and reference-style links record relationships.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new trellis repository
    ///
    /// Creates `.trellis/config.yaml` and an empty ticket directory.
    /// Run this once in your project root.
    Init(InitArgs),

    /// Show repository information
    ///
    /// Displays the ticket directory, the next ticket number and counts by status.
    Info(InfoArgs),

    /// Create a new ticket
    ///
    /// Takes the next free number. Relationships given with `--link` are
    /// checked before anything is written.
    New(NewArgs),

    /// List tickets matching filters
    ///
    /// With no filters, lists every ticket in number order.
    List(ListArgs),

    /// Show a ticket in detail
    ///
    /// Includes its sections, relationships, and the tickets it waits on
    /// or holds up.
    Show(ShowArgs),

    /// Edit a ticket
    ///
    /// Only provided fields are changed.
    Edit(EditArgs),

    /// Add a relationship between two tickets
    ///
    /// Ordering relationships (blocks, blocked-by) that would form a cycle
    /// are refused.
    Link(LinkArgs),

    /// Remove a relationship between two tickets
    Unlink(LinkArgs),

    /// Move a ticket to another group
    ///
    /// Moving a group's ticket moves the whole group directory.
    Move(MoveArgs),

    /// Create a group, or list groups
    Group(GroupArgs),

    /// Start work on a ticket
    ///
    /// Creates and checks out the ticket's branch, then marks it STARTED.
    Start(StartArgs),
}

/// Load the repository around the working directory and report anything odd
/// found while reading it.
async fn open_app() -> Result<App> {
    let app = App::from_directory(&std::env::current_dir()?).await?;
    output::print_load_warnings(app.store().warnings())?;
    Ok(app)
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args).await,
            Some(Commands::Info(args)) => {
                let app = open_app().await?;
                execute::execute_info(&app, args, output_mode).await
            }
            Some(Commands::New(args)) => {
                let mut app = open_app().await?;
                execute::execute_new(&mut app, args, output_mode).await
            }
            Some(Commands::List(args)) => {
                let app = open_app().await?;
                execute::execute_list(&app, args, output_mode).await
            }
            Some(Commands::Show(args)) => {
                let app = open_app().await?;
                execute::execute_show(&app, args, output_mode).await
            }
            Some(Commands::Edit(args)) => {
                let mut app = open_app().await?;
                execute::execute_edit(&mut app, args, output_mode).await
            }
            Some(Commands::Link(args)) => {
                let mut app = open_app().await?;
                execute::execute_link(&mut app, args, output_mode).await
            }
            Some(Commands::Unlink(args)) => {
                let mut app = open_app().await?;
                execute::execute_unlink(&mut app, args, output_mode).await
            }
            Some(Commands::Move(args)) => {
                let mut app = open_app().await?;
                execute::execute_move(&mut app, args, output_mode).await
            }
            Some(Commands::Group(args)) => {
                let mut app = open_app().await?;
                execute::execute_group(&mut app, args, output_mode).await
            }
            Some(Commands::Start(args)) => {
                let mut app = open_app().await?;
                execute::execute_start(&mut app, args, output_mode).await
            }
            None => {
                println!("Trellis ticket tracker");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupPath, RelationshipKind, TicketNumber};

    // ========== CLI Parsing Tests ==========

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["trellis"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_global_json_flag() {
        let cli = Cli::try_parse_from(["trellis", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::List(_))));
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from(["trellis", "init", "--tickets-dir", "docs/tickets", "-q"])
            .unwrap();
        match cli.command {
            Some(Commands::Init(args)) => {
                assert_eq!(args.tickets_dir.as_deref(), Some("docs/tickets"));
                assert!(args.quiet);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_parse_new_minimal() {
        let cli = Cli::try_parse_from(["trellis", "new", "Fix login"]).unwrap();
        match cli.command {
            Some(Commands::New(args)) => {
                assert_eq!(args.title, "Fix login");
                assert_eq!(args.status, StatusArg::Todo);
                assert!(args.group.is_none());
                assert!(args.link.is_empty());
            }
            _ => panic!("Expected New command"),
        }
    }

    #[test]
    fn test_parse_new_full() {
        let cli = Cli::try_parse_from([
            "trellis",
            "new",
            "Fix login",
            "--type",
            "bug",
            "-g",
            "mvp/auth",
            "--slug",
            "login",
            "-l",
            "blocked-by:1,3",
            "--both",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::New(args)) => {
                assert_eq!(args.work_type, Some(WorkTypeArg::Bug));
                assert_eq!(args.group, Some(GroupPath::parse("mvp/auth").unwrap()));
                assert_eq!(args.slug.as_deref(), Some("login"));
                assert_eq!(
                    args.link,
                    vec![
                        (RelationshipKind::BlockedBy, TicketNumber(1)),
                        (RelationshipKind::RelatesTo, TicketNumber(3)),
                    ]
                );
                assert!(args.both);
            }
            _ => panic!("Expected New command"),
        }
    }

    #[test]
    fn test_parse_new_rejects_empty_title() {
        assert!(Cli::try_parse_from(["trellis", "new", "  "]).is_err());
    }

    #[test]
    fn test_parse_new_both_requires_link() {
        assert!(Cli::try_parse_from(["trellis", "new", "Title", "--both"]).is_err());
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "trellis",
            "list",
            "-s",
            "todo,doing",
            "--group",
            "mvp",
            "--immediate",
            "--grep",
            "^fix",
            "--regex",
            "--field",
            "title",
            "-n",
            "5",
            "--sort",
            "number-desc",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::List(args)) => {
                assert_eq!(args.search.status, vec![StatusArg::Todo, StatusArg::Started]);
                assert!(args.search.immediate);
                assert!(args.search.regex);
                assert_eq!(args.search.field, TextFieldArg::Title);
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.sort, SortOrderArg::NumberDesc);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_parse_list_immediate_requires_group() {
        assert!(Cli::try_parse_from(["trellis", "list", "--immediate"]).is_err());
    }

    #[test]
    fn test_parse_edit_type_conflicts_with_clear() {
        assert!(
            Cli::try_parse_from(["trellis", "edit", "1", "--type", "bug", "--clear-type"]).is_err()
        );
    }

    #[test]
    fn test_parse_link() {
        let cli = Cli::try_parse_from(["trellis", "link", "2", "blocked-by", "#1", "--both"])
            .unwrap();
        match cli.command {
            Some(Commands::Link(args)) => {
                assert_eq!(args.source, TicketNumber(2));
                assert_eq!(args.kind, RelationshipKindArg::BlockedBy);
                assert_eq!(args.target, TicketNumber(1));
                assert!(args.both);
            }
            _ => panic!("Expected Link command"),
        }
    }

    #[test]
    fn test_parse_unlink_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["trellis", "unlink", "2", "supersedes", "1"]).is_err());
    }

    #[test]
    fn test_parse_move_to_root() {
        let cli = Cli::try_parse_from(["trellis", "move", "fix login", "/"]).unwrap();
        match cli.command {
            Some(Commands::Move(args)) => {
                assert_eq!(args.ticket, "fix login");
                assert!(args.group.is_root());
            }
            _ => panic!("Expected Move command"),
        }
    }

    #[test]
    fn test_parse_group_optional_path() {
        let cli = Cli::try_parse_from(["trellis", "group"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Group(GroupArgs { path: None }))));

        assert!(Cli::try_parse_from(["trellis", "group", "Bad Name"]).is_err());
    }

    #[test]
    fn test_parse_start_and_show() {
        let cli = Cli::try_parse_from(["trellis", "start", "12"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Start(_))));

        let cli = Cli::try_parse_from(["trellis", "--json", "show", "#12"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::Show(_))));
    }
}
