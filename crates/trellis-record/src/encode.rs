//! [`TicketRecord`] to canonical plaintext.

use crate::record::TicketRecord;

/// Encodes a record as canonical ticket text.
///
/// The layout is always: status marker, title heading, description,
/// sections, then one reference definition per relationship. Relationships
/// are never written inline.
///
/// Records that pass [`TicketRecord::validate`] decode back to an equal record.
pub fn encode(record: &TicketRecord) -> String {
    let mut out = String::from(record.status.as_str());
    if let Some(work_type) = &record.work_type {
        out.push(' ');
        out.push_str(work_type.as_str());
    }
    out.push_str("\n\n# ");
    out.push_str(&record.title);
    out.push('\n');

    push_block(&mut out, &record.description);

    for section in &record.sections {
        out.push_str("\n# ");
        out.push_str(&section.heading);
        out.push('\n');
        push_block(&mut out, &section.body);
    }

    if !record.relationships.is_empty() {
        out.push('\n');
        for relationship in &record.relationships {
            out.push_str(&format!(
                "[{}]: {} ({})\n",
                relationship.label, relationship.target, relationship.kind
            ));
        }
    }

    out
}

fn push_block(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(text);
    out.push('\n');
}
