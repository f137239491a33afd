//! End-to-end tests for the ticket store against a real directory tree.
//!
//! # Test Coverage
//!
//! - Creating tickets: numbering, slugs, placement, file contents
//! - Relationship integrity: cycles rejected with nothing written
//! - Group tickets and nested groups derived from directory layout
//! - Searching by status, group and relationship
//! - Moving tickets and whole groups

use trellis::domain::{GroupPath, NewLink, NewTicket, RelationshipKind, TicketNumber, TicketStatus};
use trellis::error::Error;
use trellis::graph::Edge;
use trellis::query::{GroupScope, Predicate, Query};

mod common;
use common::{open_store, snapshot, ticket_root, write_ticket};

fn group(path: &str) -> GroupPath {
    GroupPath::parse(path).unwrap()
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_first_ticket() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;

    let ticket = store.create(NewTicket::new("Fix login bug")).await.unwrap();

    assert_eq!(ticket.number, TicketNumber(1));
    assert_eq!(ticket.slug.as_deref(), Some("fix-login-bug"));
    assert!(ticket.group_path.is_root());
    assert_eq!(ticket.status(), &TicketStatus::Todo);

    let written = std::fs::read_to_string(root.join("1-fix-login-bug.md")).unwrap();
    assert_eq!(written, "TODO\n\n# Fix login bug\n");
}

#[tokio::test]
async fn test_created_ticket_survives_reload() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create_group(&group("mvp")).await.unwrap();

    let created = store
        .create(NewTicket {
            title: "Sign in".to_string(),
            description: "Users sign in with email.".to_string(),
            group: group("mvp"),
            ..NewTicket::default()
        })
        .await
        .unwrap();

    let reloaded = open_store(&root).await;
    assert_eq!(reloaded.ticket(created.number).unwrap(), &created);
    assert!(reloaded.warnings().is_empty());
}

#[tokio::test]
async fn test_create_in_missing_group_writes_nothing() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;

    let err = store
        .create(NewTicket {
            title: "Lost".to_string(),
            group: group("nowhere"),
            ..NewTicket::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownTarget(_)));
    assert!(snapshot(&root).is_empty());
}

#[tokio::test]
async fn test_numbers_increase_and_skip_tickets_written_elsewhere() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;

    let first = store.create(NewTicket::new("One")).await.unwrap();
    // Another process adds ticket 5 behind the store's back.
    write_ticket(&root, "5-elsewhere.md", "TODO\n\n# Elsewhere\n");
    let second = store.create(NewTicket::new("Two")).await.unwrap();

    assert_eq!(first.number, TicketNumber(1));
    assert_eq!(second.number, TicketNumber(6));
}

#[tokio::test]
async fn test_deleted_numbers_are_not_reused() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;

    store.create(NewTicket::new("One")).await.unwrap();
    let doomed = store.create(NewTicket::new("Two")).await.unwrap();
    std::fs::remove_file(root.join(&doomed.path)).unwrap();

    let next = store.create(NewTicket::new("Three")).await.unwrap();
    assert_eq!(next.number, TicketNumber(3));
}

// =============================================================================
// Relationships
// =============================================================================

#[tokio::test]
async fn test_reverse_blocks_link_is_rejected() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;

    store.create(NewTicket::new("Base")).await.unwrap();
    store
        .create(NewTicket {
            title: "Builds on base".to_string(),
            links: vec![NewLink::new(TicketNumber(1), RelationshipKind::Blocks)],
            ..NewTicket::default()
        })
        .await
        .unwrap();
    let before = snapshot(&root);

    let err = store
        .link(TicketNumber(1), TicketNumber(2), RelationshipKind::Blocks, false)
        .await
        .unwrap_err();

    match err {
        Error::CycleDetected { path } => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&TicketNumber(1)));
            assert!(path.contains(&TicketNumber(2)));
        }
        other => panic!("Expected CycleDetected, got {other:?}"),
    }
    assert_eq!(
        store.graph().edges(),
        vec![Edge::new(TicketNumber(2), TicketNumber(1), RelationshipKind::Blocks)]
    );
    assert_eq!(snapshot(&root), before);
}

#[tokio::test]
async fn test_cyclic_create_writes_nothing() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create(NewTicket::new("A")).await.unwrap();
    store
        .create(NewTicket {
            title: "B".to_string(),
            links: vec![NewLink::new(TicketNumber(1), RelationshipKind::BlockedBy)],
            ..NewTicket::default()
        })
        .await
        .unwrap();
    let before = snapshot(&root);

    // 3 blocks 2 and is blocked by 2: both arcs cannot hold.
    let err = store
        .create(NewTicket {
            title: "C".to_string(),
            links: vec![
                NewLink::new(TicketNumber(2), RelationshipKind::Blocks),
                NewLink::new(TicketNumber(2), RelationshipKind::BlockedBy),
            ],
            ..NewTicket::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CycleDetected { .. }));
    assert_eq!(snapshot(&root), before);
    assert!(store.get(TicketNumber(3)).is_none());
}

#[tokio::test]
async fn test_bidirectional_link_writes_both_files() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create(NewTicket::new("Crash")).await.unwrap();
    store.create(NewTicket::new("Patch")).await.unwrap();

    let changed = store
        .link(TicketNumber(2), TicketNumber(1), RelationshipKind::Fixes, true)
        .await
        .unwrap();
    assert!(changed);

    let reloaded = open_store(&root).await;
    let patch = reloaded.ticket(TicketNumber(2)).unwrap();
    let crash = reloaded.ticket(TicketNumber(1)).unwrap();
    assert!(patch
        .record
        .relationships
        .contains(TicketNumber(1), &RelationshipKind::Fixes));
    assert!(crash
        .record
        .relationships
        .contains(TicketNumber(2), &RelationshipKind::FixedBy));
}

#[tokio::test]
async fn test_blockers_follow_chains() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create(NewTicket::new("Schema")).await.unwrap();
    store
        .create(NewTicket {
            title: "API".to_string(),
            links: vec![NewLink::new(TicketNumber(1), RelationshipKind::BlockedBy)],
            ..NewTicket::default()
        })
        .await
        .unwrap();
    store
        .create(NewTicket {
            title: "UI".to_string(),
            links: vec![NewLink::new(TicketNumber(2), RelationshipKind::BlockedBy)],
            ..NewTicket::default()
        })
        .await
        .unwrap();

    assert_eq!(
        store.blockers(TicketNumber(3)).unwrap(),
        vec![TicketNumber(2), TicketNumber(1)]
    );
    assert_eq!(
        store.dependents(TicketNumber(1)).unwrap(),
        vec![TicketNumber(2), TicketNumber(3)]
    );
}

// =============================================================================
// Groups
// =============================================================================

#[tokio::test]
async fn test_group_ticket_is_not_its_own_child() {
    let (_temp, root) = ticket_root();
    write_ticket(&root, "8-foo/8-foo.md", "TODO\n\n# Foo\n");
    write_ticket(&root, "8-foo/9-bar.md", "TODO\n\n# Bar\n");

    let store = open_store(&root).await;

    let bar = store.ticket(TicketNumber(9)).unwrap();
    assert_eq!(bar.group_path, group("8-foo"));

    let foo = store.ticket(TicketNumber(8)).unwrap();
    assert!(foo.group_path.is_root());
    assert_eq!(foo.represents, Some(group("8-foo")));
    assert_eq!(
        store.group_ticket(&group("8-foo")).map(|t| t.number),
        Some(TicketNumber(8))
    );
    assert!(store.warnings().is_empty());
}

#[tokio::test]
async fn test_unrelated_directories_are_not_walked() {
    let (_temp, root) = ticket_root();
    write_ticket(&root, "1-top.md", "# Top\n");
    write_ticket(&root, "Not A Group/2-hidden.md", "# Hidden\n");

    let store = open_store(&root).await;
    assert_eq!(store.len(), 1);
    assert!(store.get(TicketNumber(2)).is_none());
}

#[tokio::test]
async fn test_moving_group_ticket_moves_the_group() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create_group(&group("mvp")).await.unwrap();
    store.create_group(&group("later")).await.unwrap();
    write_ticket(&root, "mvp/1-mvp.md", "TODO\n\n# MVP\n");
    write_ticket(&root, "mvp/2-login.md", "TODO\n\n# Login\n");

    let moved = store.move_ticket(TicketNumber(1), &group("later")).await.unwrap();

    assert_eq!(moved.represents, Some(group("later/mvp")));
    assert!(root.join("later/mvp/2-login.md").is_file());
    assert!(!root.join("mvp").exists());
    assert_eq!(
        store.ticket(TicketNumber(2)).unwrap().group_path,
        group("later/mvp")
    );
}

#[tokio::test]
async fn test_move_keeps_relationships() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create_group(&group("mvp")).await.unwrap();
    store.create(NewTicket::new("Base")).await.unwrap();
    store
        .create(NewTicket {
            title: "Top".to_string(),
            links: vec![NewLink::new(TicketNumber(1), RelationshipKind::BlockedBy)],
            ..NewTicket::default()
        })
        .await
        .unwrap();

    store.move_ticket(TicketNumber(1), &group("mvp")).await.unwrap();

    let reloaded = open_store(&root).await;
    assert_eq!(reloaded.blockers(TicketNumber(2)).unwrap(), vec![TicketNumber(1)]);
    assert_eq!(reloaded.ticket(TicketNumber(1)).unwrap().group_path, group("mvp"));
}

#[tokio::test]
async fn test_same_relative_path_resolves_the_same_under_any_root() {
    let (_a, root_a) = ticket_root();
    let (_b, root_b) = ticket_root();
    for root in [&root_a, &root_b] {
        write_ticket(root, "mvp/auth/4-token.md", "# Token\n");
    }

    let a = open_store(&root_a).await;
    let b = open_store(&root_b).await;
    let (ta, tb) = (a.ticket(TicketNumber(4)).unwrap(), b.ticket(TicketNumber(4)).unwrap());
    assert_eq!(ta.slug, tb.slug);
    assert_eq!(ta.group_path, tb.group_path);
    assert_eq!(ta.group_path, group("mvp/auth"));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_done_in_group_over_ten_tickets() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    for path in ["mvp", "mvp/auth", "other"] {
        store.create_group(&group(path)).await.unwrap();
    }

    let layout = [
        ("", TicketStatus::Done),
        ("mvp", TicketStatus::Todo),
        ("mvp", TicketStatus::Done),
        ("mvp/auth", TicketStatus::Todo),
        ("mvp/auth", TicketStatus::Done),
        ("", TicketStatus::Todo),
        ("mvp", TicketStatus::Done),
        ("other", TicketStatus::Done),
        ("mvp", TicketStatus::Started),
        ("", TicketStatus::Done),
    ];
    for (i, (path, status)) in layout.into_iter().enumerate() {
        store
            .create(NewTicket {
                title: format!("Ticket {}", i + 1),
                status,
                group: group(path),
                ..NewTicket::default()
            })
            .await
            .unwrap();
    }
    assert_eq!(store.len(), 10);

    let query = Query::new()
        .status(TicketStatus::Done)
        .in_group(group("mvp"), GroupScope::Recursive);
    let found: Vec<_> = store.search(&query).unwrap().iter().map(|t| t.number).collect();

    assert_eq!(found, vec![TicketNumber(3), TicketNumber(5), TicketNumber(7)]);
}

#[tokio::test]
async fn test_search_by_relationship() {
    let (_temp, root) = ticket_root();
    let mut store = open_store(&root).await;
    store.create(NewTicket::new("Crash")).await.unwrap();
    store
        .create(NewTicket {
            title: "Patch".to_string(),
            links: vec![NewLink::new(TicketNumber(1), RelationshipKind::Fixes)],
            ..NewTicket::default()
        })
        .await
        .unwrap();
    store.create(NewTicket::new("Unrelated")).await.unwrap();

    let linked_to_crash = Query::new().with(Predicate::Relationship {
        kind: Some(RelationshipKind::Fixes),
        other: Some(TicketNumber(1)),
        direction: None,
    });
    let found: Vec<_> = store
        .search(&linked_to_crash)
        .unwrap()
        .iter()
        .map(|t| t.number)
        .collect();
    assert_eq!(found, vec![TicketNumber(2)]);

    // Without a ticket, both ends of the edge match.
    let any_fix = Query::new().with(Predicate::Relationship {
        kind: Some(RelationshipKind::Fixes),
        other: None,
        direction: None,
    });
    let found: Vec<_> = store.search(&any_fix).unwrap().iter().map(|t| t.number).collect();
    assert_eq!(found, vec![TicketNumber(1), TicketNumber(2)]);
}
