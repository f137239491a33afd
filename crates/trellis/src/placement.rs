//! Ticket identity and group placement derived from file paths.
//!
//! Everything here is a pure function of a path relative to the ticket
//! root: the same relative path resolves the same way under any root.

use crate::domain::{GroupPath, TicketNumber};
use crate::error::PlacementError;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Extension of ticket files.
pub const TICKET_EXTENSION: &str = "md";

/// Maximum length of a generated slug.
pub const MAX_SLUG_LENGTH: usize = 60;

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern is valid"));

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:-([a-z0-9]+(?:-[a-z0-9]+)*))?\.md$").expect("file name pattern is valid")
});

/// Where a ticket file sits, as derived from its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Number from the file name
    pub number: TicketNumber,
    /// Slug from the file name
    pub slug: Option<String>,
    /// Enclosing groups
    pub group_path: GroupPath,
    /// Set when the file is its directory's group ticket
    pub represents: Option<GroupPath>,
    /// Path relative to the ticket root
    pub path: PathBuf,
}

/// Whether `name` is a valid slug, and therefore a valid group name.
pub fn is_valid_slug(name: &str) -> bool {
    SLUG.is_match(name)
}

/// Derives a slug from a title.
///
/// Lower-cases ASCII letters and digits, turns every other run of characters
/// into a single dash, and shortens the result to [`MAX_SLUG_LENGTH`] at a
/// word boundary when it can. May return an empty string.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    if slug.len() <= MAX_SLUG_LENGTH {
        return slug.to_string();
    }

    // All characters are ASCII here, so byte offsets are char boundaries.
    let cut = &slug[..=MAX_SLUG_LENGTH];
    let shortened = match cut.rfind('-') {
        Some(boundary) if boundary > 0 => &cut[..boundary],
        _ => &slug[..MAX_SLUG_LENGTH],
    };
    shortened.trim_end_matches('-').to_string()
}

/// The file name for a ticket.
pub fn file_name(number: TicketNumber, slug: Option<&str>) -> String {
    match slug {
        Some(slug) => format!("{number}-{slug}.{TICKET_EXTENSION}"),
        None => format!("{number}.{TICKET_EXTENSION}"),
    }
}

/// Splits a ticket file name into number and slug.
pub fn parse_file_name(name: &str) -> Option<(TicketNumber, Option<String>)> {
    let caps = FILE_NAME.captures(name)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    let slug = caps.get(2).map(|m| m.as_str().to_string());
    Some((TicketNumber(number), slug))
}

/// Whether a path looks like it was meant to be a ticket file.
pub fn is_ticket_candidate(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TICKET_EXTENSION)
}

/// Resolves number, slug and group path from a ticket file's location.
///
/// Ancestor directories that are not valid group names are skipped. A file
/// whose stem or slug equals the name of the directory it sits in is that
/// directory's group ticket: its `group_path` is the chain above the group
/// and `represents` names the group.
///
/// # Errors
///
/// - [`PlacementError::OutsideRoot`] if `path` is not under `root`
/// - [`PlacementError::BadFileName`] if the file name does not match the scheme
pub fn resolve_identity(path: &Path, root: &Path) -> Result<Placement, PlacementError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PlacementError::OutsideRoot {
            path: path.to_path_buf(),
        })?;

    let name = relative
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PlacementError::BadFileName {
            path: relative.to_path_buf(),
        })?;
    let (number, slug) = parse_file_name(name).ok_or_else(|| PlacementError::BadFileName {
        path: relative.to_path_buf(),
    })?;

    let parent = relative.parent().unwrap_or_else(|| Path::new(""));
    let groups: Vec<String> = parent
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .filter(|name| is_valid_slug(name))
        .map(str::to_string)
        .collect();

    let immediate = parent.file_name().and_then(|name| name.to_str());
    let stem = name.strip_suffix(&format!(".{TICKET_EXTENSION}")).unwrap_or(name);
    let is_group_ticket = match (immediate, groups.last()) {
        (Some(dir), Some(last)) if dir == last => {
            stem == dir || slug.as_deref() == Some(dir)
        }
        _ => false,
    };

    let (group_path, represents) = if is_group_ticket {
        let group = GroupPath::from_segments(groups);
        (group.parent().unwrap_or_default(), Some(group))
    } else {
        (GroupPath::from_segments(groups), None)
    };

    Ok(Placement {
        number,
        slug,
        group_path,
        represents,
        path: relative.to_path_buf(),
    })
}

/// The number to give the next ticket: one more than the highest number
/// ever seen, or [`TicketNumber::FIRST`] when there is none.
///
/// Gaps are never filled, so a number is never handed out twice. Returns
/// `None` once the highest possible number has been seen.
pub fn next_number(
    numbers: impl IntoIterator<Item = TicketNumber>,
    high_water: Option<TicketNumber>,
) -> Option<TicketNumber> {
    numbers
        .into_iter()
        .chain(high_water)
        .max()
        .map_or(Some(TicketNumber::FIRST), TicketNumber::next)
}
