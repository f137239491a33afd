//! Output formatting for CLI commands.
//!
//! Commands print either human-readable text or JSON. The text renderers
//! take any [`Write`] so they can be exercised against a buffer.

pub mod color;

use crate::domain::{GroupPath, LinkDirection, RelatedTicket, Ticket, TicketNumber};
use crate::store::LoadWarning;
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, colorize_group, colorize_number, colorize_status, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

const DEFAULT_TERMINAL_WIDTH: u16 = 80;
const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(max_width: usize, use_colors: bool) -> Self {
        Self {
            max_width,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `TRELLIS_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TRELLIS_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let max_width = match env::var("TRELLIS_MAX_WIDTH") {
            Ok(s) if !s.is_empty() => match s.parse() {
                Ok(width) => width,
                Err(_) => {
                    tracing::warn!(
                        env_var = "TRELLIS_MAX_WIDTH",
                        value = %s,
                        default = DEFAULT_MAX_CONTENT_WIDTH,
                        "Invalid value, using default"
                    );
                    DEFAULT_MAX_CONTENT_WIDTH
                }
            },
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("TRELLIS_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            max_width,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

fn get_terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(DEFAULT_TERMINAL_WIDTH, |(w, _)| w.0)
        .into()
}

fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, max_width.max(1))
                    .into_iter()
                    .map(std::borrow::Cow::into_owned)
                    .collect()
            }
        })
        .collect()
}

/// Everything `show` prints about one ticket.
#[derive(Debug, Serialize)]
pub struct TicketDetails<'a> {
    /// The ticket itself
    #[serde(flatten)]
    pub ticket: &'a Ticket,

    /// Relationship edges touching the ticket
    pub related: Vec<RelatedTicket>,

    /// Tickets that must be done first, nearest first
    pub blocked_by: Vec<TicketNumber>,

    /// Tickets waiting on this one, nearest first
    pub blocking: Vec<TicketNumber>,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Print a list of tickets in the specified format
pub fn print_tickets(tickets: &[&Ticket], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&tickets),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            write_tickets_text(&mut io::stdout().lock(), tickets, &config)
        }
    }
}

/// Print one ticket with its relationships (for the show command)
pub fn print_ticket_details(details: &TicketDetails<'_>, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(details),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let width = get_terminal_width().min(config.max_width);
            write_details_text(&mut io::stdout().lock(), details, width, &config)
        }
    }
}

/// Print groups with the number of the ticket standing for each, if any
pub fn print_groups(groups: &[(&GroupPath, Option<TicketNumber>)], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            let entries: Vec<_> = groups
                .iter()
                .map(|(path, ticket)| {
                    serde_json::json!({
                        "path": path.to_string(),
                        "ticket": ticket,
                    })
                })
                .collect();
            print_json(&entries)
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            write_groups_text(&mut io::stdout().lock(), groups, &config)
        }
    }
}

/// Report load warnings on stderr so they never mix with command output.
pub fn print_load_warnings(warnings: &[LoadWarning]) -> io::Result<()> {
    let config = OutputConfig::from_env();
    write_warnings(&mut io::stderr().lock(), warnings, &config)
}

// ============================================================================
// Text Formatting
// ============================================================================

fn ticket_line(ticket: &Ticket, config: &OutputConfig) -> String {
    let mut line = format!(
        "{} {} {}",
        colorize_number(ticket.number, config),
        colorize_status(ticket.status(), config),
        ticket.title()
    );
    if let Some(work_type) = &ticket.record.work_type {
        line.push_str(&format!(" {}", dimmed(&format!("[{work_type}]"), config)));
    }
    if !ticket.group_path.is_root() {
        line.push_str(&format!("  {}", colorize_group(&ticket.group_path, config)));
    }
    line
}

fn write_tickets_text<W: Write>(
    w: &mut W,
    tickets: &[&Ticket],
    config: &OutputConfig,
) -> io::Result<()> {
    if tickets.is_empty() {
        writeln!(w, "No tickets found.")?;
        return Ok(());
    }

    for ticket in tickets {
        writeln!(w, "{}", ticket_line(ticket, config))?;
    }
    Ok(())
}

fn write_section<W: Write>(
    w: &mut W,
    title: &str,
    content: &str,
    width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    if content.trim().is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{}:", bold(title, config))?;
    for line in wrap_text(content, width.saturating_sub(2)) {
        writeln!(w, "  {line}")?;
    }
    Ok(())
}

fn number_list(numbers: &[TicketNumber], config: &OutputConfig) -> String {
    numbers
        .iter()
        .map(|n| colorize_number(*n, config))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_details_text<W: Write>(
    w: &mut W,
    details: &TicketDetails<'_>,
    width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    let ticket = details.ticket;
    writeln!(w, "{}", ticket_line(ticket, config))?;
    writeln!(w, "  {} {}", dimmed("File:  ", config), ticket.path.display())?;
    writeln!(w, "  {} {}", dimmed("Branch:", config), ticket.branch_name())?;
    if let Some(group) = &ticket.represents {
        writeln!(
            w,
            "  {} {}",
            dimmed("Group: ", config),
            colorize_group(group, config)
        )?;
    }

    write_section(w, "Description", &ticket.record.description, width, config)?;
    for section in &ticket.record.sections {
        write_section(w, &section.heading, &section.body, width, config)?;
    }

    if !details.related.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}:", bold("Relationships", config))?;
        for related in &details.related {
            let arrow = match related.direction {
                LinkDirection::Outgoing => "->",
                LinkDirection::Incoming => "<-",
            };
            writeln!(
                w,
                "  {arrow} {} {}",
                colorize_number(related.number, config),
                related.kind.as_str()
            )?;
        }
    }

    if !details.blocked_by.is_empty() {
        writeln!(w)?;
        writeln!(
            w,
            "{} {}",
            bold("Blocked by:", config),
            number_list(&details.blocked_by, config)
        )?;
    }
    if !details.blocking.is_empty() {
        if details.blocked_by.is_empty() {
            writeln!(w)?;
        }
        writeln!(
            w,
            "{} {}",
            bold("Blocking:", config),
            number_list(&details.blocking, config)
        )?;
    }
    Ok(())
}

fn write_groups_text<W: Write>(
    w: &mut W,
    groups: &[(&GroupPath, Option<TicketNumber>)],
    config: &OutputConfig,
) -> io::Result<()> {
    if groups.is_empty() {
        writeln!(w, "No groups.")?;
        return Ok(());
    }
    for (path, ticket) in groups {
        match ticket {
            Some(number) => writeln!(
                w,
                "{}  {}",
                colorize_group(path, config),
                colorize_number(*number, config)
            )?,
            None => writeln!(w, "{}", colorize_group(path, config))?,
        }
    }
    Ok(())
}

fn write_warnings<W: Write>(
    w: &mut W,
    warnings: &[LoadWarning],
    config: &OutputConfig,
) -> io::Result<()> {
    for load_warning in warnings {
        writeln!(
            w,
            "{} {}",
            warning(&format!("warning[{}]:", load_warning.kind()), config),
            load_warning
        )?;
    }
    Ok(())
}
