//! Mutating store operations.
//!
//! Every operation follows the same shape: reload, build the new records and
//! a candidate graph, validate both, then write. Nothing is written until all
//! checks pass, and in-memory state is only replaced after the writes.

use super::{TicketStore, load};
use crate::domain::{
    GroupPath, NewTicket, Relationship, RelationshipKind, Relationships, Ticket, TicketNumber,
    TicketRecord, TicketStatus, TicketUpdate,
};
use crate::error::{Error, PlacementError, Result, Target};
use crate::graph::RelationshipGraph;
use crate::placement;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

impl TicketStore {
    /// Creates a ticket.
    ///
    /// If another process takes the chosen number first, the store reloads
    /// and tries once more with a fresh number.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTicket`] if the fields cannot be written losslessly
    /// - [`Error::UnknownTarget`] if the group or a link target does not exist
    /// - [`Error::DuplicateNumber`] if an explicit number is taken
    /// - [`Error::CycleDetected`] if a link would close an ordering cycle
    /// - [`Error::Conflict`] if the number was still taken on retry
    pub async fn create(&mut self, new: NewTicket) -> Result<Ticket> {
        match self.try_create(&new).await {
            Err(e) if e.is_retryable() && new.number.is_none() => {
                tracing::warn!(error = %e, "Ticket number taken concurrently, retrying");
                self.try_create(&new).await
            }
            result => result,
        }
    }

    async fn try_create(&mut self, new: &NewTicket) -> Result<Ticket> {
        self.refresh().await?;

        if !self.has_group(&new.group) {
            return Err(Error::UnknownTarget(Target::Group(new.group.clone())));
        }

        let slug = match &new.slug {
            Some(slug) if !placement::is_valid_slug(slug) => {
                return Err(PlacementError::InvalidSlug { slug: slug.clone() }.into());
            }
            Some(slug) => Some(slug.clone()),
            None => Some(placement::slugify(&new.title)).filter(|slug| !slug.is_empty()),
        };

        let mut record = TicketRecord {
            title: new.title.trim().to_string(),
            status: new.status.clone(),
            work_type: new.work_type.clone(),
            description: trellis_record::normalize_block(&new.description),
            sections: new.sections.clone(),
            relationships: Relationships::new(),
        };
        for link in &new.links {
            record
                .relationships
                .insert(Relationship::new(link.target, link.kind.clone()));
        }
        record.validate().map_err(Error::InvalidTicket)?;

        let number = match new.number {
            Some(number) => number,
            None => self.next_number()?,
        };
        if self.claimed.contains(&number) {
            return Err(Error::DuplicateNumber {
                number,
                paths: self.get(number).map(|t| t.path.clone()).into_iter().collect(),
            });
        }

        // Everything below is keyed on the number; check targets against it.
        let mut graph = self.graph.clone();
        graph.add_node(number);
        let mut updated: BTreeMap<TicketNumber, Ticket> = BTreeMap::new();
        for link in &new.links {
            graph.add_edge(number, link.target, link.kind.clone())?;
            if link.reciprocal && link.target != number {
                let complement = link.kind.complement();
                graph.add_edge(link.target, number, complement.clone())?;
                if !updated.contains_key(&link.target) {
                    updated.insert(link.target, self.ticket(link.target)?.clone());
                }
                if let Some(target) = updated.get_mut(&link.target) {
                    target
                        .record
                        .relationships
                        .insert(Relationship::new(number, complement));
                }
            }
        }
        for target in updated.values() {
            target.record.validate().map_err(Error::InvalidTicket)?;
        }

        // Reserve the number before writing, so a failed write never frees it.
        self.high_water = self.high_water.max(Some(number));

        let relative = new
            .group
            .to_path(&PathBuf::new())
            .join(placement::file_name(number, slug.as_deref()));
        let text = trellis_record::encode(&record);
        match self.fs.create_file(&self.absolute(&relative), &text).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::Conflict {
                    number,
                    path: relative,
                });
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(path = %relative.display(), "Wrote ticket");

        // Another process may have taken the number under a different name.
        let rival = load::claimants(self.fs.as_ref(), &self.root, number)
            .await?
            .into_iter()
            .find(|path| path != &relative);
        if let Some(rival) = rival {
            self.discard(&relative).await;
            return Err(Error::Conflict {
                number,
                path: rival,
            });
        }

        let targets: Vec<&Ticket> = updated.values().collect();
        if let Err(e) = self.persist_all(&targets).await {
            self.discard(&relative).await;
            return Err(e);
        }
        let mut written = vec![relative.clone()];
        written.extend(targets.iter().map(|target| target.path.clone()));

        let ticket = Ticket {
            number,
            slug,
            group_path: new.group.clone(),
            represents: None,
            path: relative,
            record,
        };
        self.claimed.insert(number);
        self.tickets.insert(number, ticket.clone());
        self.tickets.extend(updated);
        self.graph = graph;

        tracing::info!(number = %number, title = %ticket.title(), "Created ticket");
        self.commit(&written, &format!("Create #{number}: {}", ticket.title()))
            .await;
        Ok(ticket)
    }

    /// Changes fields of a ticket.
    ///
    /// Relationships added by the update must point at existing tickets and
    /// must not close a cycle. Relationships the ticket already had are kept
    /// even if they dangle.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if there is no such ticket
    /// - [`Error::InvalidTicket`] if the result cannot be written losslessly
    /// - [`Error::UnknownTarget`] or [`Error::CycleDetected`] for a new relationship
    pub async fn edit(&mut self, number: TicketNumber, update: &TicketUpdate) -> Result<Ticket> {
        self.refresh().await?;
        let mut ticket = self.ticket(number)?.clone();
        if update.is_empty() {
            return Ok(ticket);
        }

        let previous = ticket.record.relationships.clone();
        update.apply(&mut ticket.record);
        ticket.record.validate().map_err(Error::InvalidTicket)?;

        let graph = if update.relationships.is_some() {
            Some(self.rewire(number, &ticket.record, &previous)?)
        } else {
            None
        };

        self.persist(&ticket).await?;
        if let Some(graph) = graph {
            self.graph = graph;
        }
        self.tickets.insert(number, ticket.clone());

        tracing::info!(number = %number, "Updated ticket");
        self.commit(&[ticket.path.clone()], &format!("Update #{number}: {}", ticket.title()))
            .await;
        Ok(ticket)
    }

    /// Builds the graph with `record`'s relationships replacing the old ones.
    fn rewire(
        &self,
        number: TicketNumber,
        record: &TicketRecord,
        previous: &Relationships,
    ) -> Result<RelationshipGraph> {
        let mut graph = self.graph.clone();
        for edge in graph.edges_from(number) {
            graph.remove_edge(edge.source, edge.target, &edge.kind);
        }

        for relationship in &record.relationships {
            match graph.add_edge(number, relationship.target, relationship.kind.clone()) {
                Ok(_) => {}
                Err(Error::UnknownTarget(_) | Error::CycleDetected { .. })
                    if previous.contains(relationship.target, &relationship.kind) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(graph)
    }

    /// Adds a relationship, and optionally its complement on the target.
    ///
    /// Both edges are checked before either is written. Returns `false` if
    /// the relationships were already there.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if `source` does not exist
    /// - [`Error::UnknownTarget`] if `target` does not exist
    /// - [`Error::CycleDetected`] if either edge would close an ordering cycle
    pub async fn link(
        &mut self,
        source: TicketNumber,
        target: TicketNumber,
        kind: RelationshipKind,
        bidirectional: bool,
    ) -> Result<bool> {
        self.refresh().await?;
        let mut from = self.ticket(source)?.clone();
        if self.get(target).is_none() {
            return Err(Error::UnknownTarget(Target::Ticket(target)));
        }

        let mut graph = self.graph.clone();
        graph.add_edge(source, target, kind.clone())?;
        let mut changed = vec![];
        if from
            .record
            .relationships
            .insert(Relationship::new(target, kind.clone()))
        {
            changed.push(source);
        }

        let mut to = None;
        if bidirectional && source != target {
            let complement = kind.complement();
            graph.add_edge(target, source, complement.clone())?;
            let mut reciprocal = self.ticket(target)?.clone();
            if reciprocal
                .record
                .relationships
                .insert(Relationship::new(source, complement))
            {
                changed.push(target);
                to = Some(reciprocal);
            }
        }

        if changed.is_empty() {
            return Ok(false);
        }
        from.record.validate().map_err(Error::InvalidTicket)?;
        if let Some(to) = &to {
            to.record.validate().map_err(Error::InvalidTicket)?;
        }

        let mut batch = Vec::new();
        if changed.contains(&source) {
            batch.push(from);
        }
        batch.extend(to);
        let written: Vec<PathBuf> = batch.iter().map(|t| t.path.clone()).collect();
        self.commit_batch(batch, graph).await?;

        tracing::info!(%source, %target, %kind, bidirectional, "Linked tickets");
        self.commit(&written, &format!("Link #{source} {kind} #{target}"))
            .await;
        Ok(true)
    }

    /// Removes a relationship, and optionally its complement on the target.
    ///
    /// Both records are checked before either is written. Returns `false` if
    /// neither relationship existed.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if `source` does not exist
    /// - [`Error::InvalidTicket`] if the relationship is also spelled out as
    ///   an inline link, which would bring it back on the next load
    pub async fn unlink(
        &mut self,
        source: TicketNumber,
        target: TicketNumber,
        kind: &RelationshipKind,
        bidirectional: bool,
    ) -> Result<bool> {
        self.refresh().await?;
        let mut from = self.ticket(source)?.clone();
        let mut graph = self.graph.clone();
        let mut batch = Vec::new();

        if from.record.relationships.remove(target, kind).is_some() {
            graph.remove_edge(source, target, kind);
            batch.push(from);
        }

        if bidirectional && source != target {
            let complement = kind.complement();
            if let Some(mut to) = self.get(target).cloned() {
                if to.record.relationships.remove(source, &complement).is_some() {
                    graph.remove_edge(target, source, &complement);
                    batch.push(to);
                }
            }
        }

        if batch.is_empty() {
            return Ok(false);
        }
        for ticket in &batch {
            ticket.record.validate().map_err(Error::InvalidTicket)?;
        }
        let written: Vec<PathBuf> = batch.iter().map(|t| t.path.clone()).collect();
        self.commit_batch(batch, graph).await?;

        tracing::info!(%source, %target, %kind, "Unlinked tickets");
        self.commit(&written, &format!("Unlink #{source} {kind} #{target}"))
            .await;
        Ok(true)
    }

    /// Moves a ticket into another group.
    ///
    /// A group ticket takes its whole group directory along. Relationships
    /// are untouched: they refer to numbers, not paths.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if there is no such ticket
    /// - [`Error::UnknownTarget`] if `destination` does not exist
    /// - [`PlacementError::MoveIntoSelf`] if a group would end up inside itself
    /// - [`PlacementError::WouldRepresentGroup`] if an ordinary ticket would
    ///   land in the group it is named after
    /// - [`PlacementError::DestinationExists`] if the new location is taken
    pub async fn move_ticket(
        &mut self,
        number: TicketNumber,
        destination: &GroupPath,
    ) -> Result<Ticket> {
        self.refresh().await?;
        let ticket = self.ticket(number)?.clone();
        if !self.has_group(destination) {
            return Err(Error::UnknownTarget(Target::Group(destination.clone())));
        }
        if &ticket.group_path == destination {
            return Ok(ticket);
        }

        let (from, to) = match &ticket.represents {
            Some(group) => {
                if destination.starts_with(group) {
                    return Err(PlacementError::MoveIntoSelf {
                        group: group.clone(),
                        destination: destination.clone(),
                    }
                    .into());
                }
                let name = group.name().unwrap_or_default();
                (group.to_path(&self.root), destination.child(name).to_path(&self.root))
            }
            None => {
                let name = ticket.path.file_name().unwrap_or_default();
                let to = destination.to_path(&self.root).join(name);
                if placement::resolve_identity(&to, &self.root)
                    .is_ok_and(|placed| placed.represents.is_some())
                {
                    return Err(PlacementError::WouldRepresentGroup {
                        path: ticket.path.clone(),
                        group: destination.clone(),
                    }
                    .into());
                }
                (self.absolute(&ticket.path), to)
            }
        };

        if self.fs.exists(&to).await {
            return Err(PlacementError::DestinationExists { path: to }.into());
        }
        self.fs.move_path(&from, &to).await.map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                Error::from(PlacementError::DestinationExists { path: to.clone() })
            } else {
                Error::from(e)
            }
        })?;
        tracing::debug!(from = %from.display(), to = %to.display(), "Moved");

        // Placement is derived from paths; reload rather than patch it up.
        self.refresh().await?;
        let moved = self.ticket(number)?.clone();

        tracing::info!(%number, destination = %destination, "Moved ticket");
        self.commit(&[from, to], &format!("Move #{number} to {destination}"))
            .await;
        Ok(moved)
    }

    /// Creates a group directory. Returns `false` if it already exists.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTarget`] if the parent group does not exist
    /// - [`PlacementError::DestinationExists`] if a file is in the way
    pub async fn create_group(&mut self, group: &GroupPath) -> Result<bool> {
        self.refresh().await?;
        if self.has_group(group) {
            return Ok(false);
        }
        let parent = group.parent().unwrap_or_default();
        if !self.has_group(&parent) {
            return Err(Error::UnknownTarget(Target::Group(parent)));
        }

        let path = group.to_path(&self.root);
        if self.fs.exists(&path).await {
            return Err(PlacementError::DestinationExists { path }.into());
        }
        self.fs.create_dir(&path).await?;
        self.groups.insert(group.clone());

        tracing::info!(group = %group, "Created group");
        Ok(true)
    }

    /// Starts work on a ticket: switches to its branch and marks it started.
    ///
    /// The branch is `<prefix><number>-<slug>` and is created if needed.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if there is no such ticket
    /// - [`Error::Vcs`] if the branch cannot be created or checked out
    pub async fn start(&mut self, number: TicketNumber) -> Result<Ticket> {
        self.refresh().await?;
        let ticket = self.ticket(number)?;
        let branch = format!("{}{}", self.options.branch_prefix, ticket.branch_name());

        self.vcs.create_branch(&branch).await?;
        self.vcs.checkout(&branch).await?;
        tracing::info!(%number, branch = %branch, "Switched to ticket branch");

        let update = TicketUpdate {
            status: Some(TicketStatus::Started),
            ..TicketUpdate::default()
        };
        self.edit(number, &update).await
    }

    /// Writes changed tickets, then swaps them and `graph` into memory.
    ///
    /// Memory is left alone if any write fails.
    async fn commit_batch(&mut self, batch: Vec<Ticket>, graph: RelationshipGraph) -> Result<()> {
        let refs: Vec<&Ticket> = batch.iter().collect();
        self.persist_all(&refs).await?;
        for ticket in batch {
            self.tickets.insert(ticket.number, ticket);
        }
        self.graph = graph;
        Ok(())
    }

    /// Writes tickets in order. If one write fails, the ones before it are
    /// rewritten from their in-memory state.
    async fn persist_all(&self, tickets: &[&Ticket]) -> Result<()> {
        for (done, ticket) in tickets.iter().enumerate() {
            if let Err(e) = self.persist(ticket).await {
                for written in &tickets[..done] {
                    let Some(original) = self.get(written.number) else {
                        continue;
                    };
                    if let Err(restore) = self.persist(original).await {
                        tracing::warn!(
                            path = %original.path.display(),
                            error = %restore,
                            "Could not restore ticket after a failed write"
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Best-effort removal of a ticket file this operation created.
    async fn discard(&self, relative: &Path) {
        if let Err(e) = self.fs.remove_file(&self.absolute(relative)).await {
            tracing::warn!(path = %relative.display(), error = %e, "Could not remove ticket file");
        }
    }

    async fn persist(&self, ticket: &Ticket) -> Result<()> {
        let text = trellis_record::encode(&ticket.record);
        self.fs.write_file(&self.absolute(&ticket.path), &text).await?;
        tracing::debug!(path = %ticket.path.display(), "Wrote ticket");
        Ok(())
    }

    async fn commit(&self, paths: &[PathBuf], message: &str) {
        if !self.options.auto_commit {
            return;
        }
        let paths: Vec<PathBuf> = paths
            .iter()
            .map(|path| {
                if path.is_absolute() {
                    path.clone()
                } else {
                    self.absolute(path)
                }
            })
            .collect();
        if let Err(e) = self.vcs.stage_and_commit(&paths, message).await {
            tracing::warn!(error = %e, "Auto-commit failed; changes are on disk but not committed");
        }
    }
}
