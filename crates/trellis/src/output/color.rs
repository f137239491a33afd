//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Done:   green  (DONE status, completed actions)
//!   - Warning/Active: yellow (STARTED status, load warnings)
//!   - Error:          red    (failures)
//!   - Info/Reference: cyan   (ticket numbers)
//!   - Accent:         magenta (group paths)
//!   - Muted:          dimmed (field labels, STOPPED status)

use crate::domain::{GroupPath, TicketNumber, TicketStatus};
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Apply color to a status marker, padded to the widest known status.
pub(crate) fn colorize_status(status: &TicketStatus, config: &OutputConfig) -> String {
    let text = format!("{:<7}", status.as_str());
    if !config.use_colors {
        return text;
    }
    match status {
        TicketStatus::Todo => text.white().to_string(),
        TicketStatus::Started => text.yellow().to_string(),
        TicketStatus::Stopped => text.dimmed().to_string(),
        TicketStatus::Done => text.green().to_string(),
        TicketStatus::Other(_) => text.magenta().to_string(),
    }
}

/// Colorize a ticket number (cyan), written as `#N`.
pub(crate) fn colorize_number(number: TicketNumber, config: &OutputConfig) -> String {
    let text = format!("#{number}");
    if !config.use_colors {
        return text;
    }
    text.cyan().to_string()
}

/// Colorize a group path (magenta); the root is shown as `/`.
pub(crate) fn colorize_group(group: &GroupPath, config: &OutputConfig) -> String {
    let text = if group.is_root() {
        "/".to_string()
    } else {
        group.to_string()
    };
    if !config.use_colors {
        return text;
    }
    text.magenta().to_string()
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn plain() -> OutputConfig {
        OutputConfig::new(80, false)
    }

    fn colored() -> OutputConfig {
        colored::control::set_override(true);
        OutputConfig::new(80, true)
    }

    #[rstest]
    #[case::todo(TicketStatus::Todo, "TODO   ")]
    #[case::started(TicketStatus::Started, "STARTED")]
    #[case::other(TicketStatus::Other("REVIEW".to_string()), "REVIEW ")]
    fn test_colorize_status_plain(#[case] status: TicketStatus, #[case] expected: &str) {
        assert_eq!(colorize_status(&status, &plain()), expected);
    }

    #[test]
    fn test_semantic_colors_disabled() {
        let config = plain();
        assert_eq!(success("ok", &config), "ok");
        assert_eq!(error("bad", &config), "bad");
        assert_eq!(warning("hmm", &config), "hmm");
        assert_eq!(info("fyi", &config), "fyi");
        assert_eq!(bold("title", &config), "title");
        assert_eq!(dimmed("label", &config), "label");
    }

    #[test]
    fn test_semantic_colors_enabled_wrap_text() {
        let config = colored();
        let text = success("ok", &config);
        colored::control::unset_override();
        assert!(text.contains("ok"));
        assert_ne!(text, "ok");
    }

    #[test]
    fn test_colorize_number_and_group() {
        let config = plain();
        assert_eq!(colorize_number(TicketNumber(12), &config), "#12");
        assert_eq!(colorize_group(&GroupPath::root(), &config), "/");
        assert_eq!(
            colorize_group(&GroupPath::parse("mvp/auth").unwrap(), &config),
            "mvp/auth"
        );
    }
}
