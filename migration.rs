//! Moving every note from one backend to the other.
//!
//! For each note of the source backend:
//!
//! 1. no note of that name in the target: copy it over
//! 2. a note of that name with identical bytes: skip it
//! 3. a note of that name with different bytes: copy it over as `name-1`,
//!    `name-2`, ... using the first free name. A suffixed name that already
//!    holds identical bytes counts as done, so re-running a pass never adds
//!    more copies.
//!
//! Bytes are compared as stored, so encrypted notes move without needing the
//! password and keep their encryption flag.

use crate::backend::StorageBackend;
use crate::cache::NameCache;
use crate::error::{Result, VaultError};
use crate::naming::to_physical_name;
use crate::system_notes::is_system_note_name;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDecision {
    Create,
    Skip,
    CreateWithSuffix(u32),
}

/// Decision for one note, consumed as soon as it is made.
#[derive(Debug)]
pub struct MigrationPlanEntry {
    pub logical_name: String,
    pub source_content: Vec<u8>,
    pub encrypted: bool,
    pub decision: MigrationDecision,
}

impl MigrationPlanEntry {
    /// Name the note ends up with in the target.
    pub fn target_name(&self) -> String {
        match self.decision {
            MigrationDecision::CreateWithSuffix(n) => suffixed(&self.logical_name, n),
            _ => self.logical_name.clone(),
        }
    }
}

/// Outcome of one migrated note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedNote {
    pub logical_name: String,
    pub target_name: String,
    pub encrypted: bool,
    pub decision: MigrationDecision,
    source_id: String,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub notes: Vec<MigratedNote>,
}

impl MigrationReport {
    pub fn count(&self, decision: fn(&MigrationDecision) -> bool) -> usize {
        self.notes.iter().filter(|n| decision(&n.decision)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|d| *d == MigrationDecision::Create)
    }

    pub fn skipped(&self) -> usize {
        self.count(|d| *d == MigrationDecision::Skip)
    }

    pub fn renamed(&self) -> usize {
        self.count(|d| matches!(d, MigrationDecision::CreateWithSuffix(_)))
    }
}

pub struct MigrationEngine {
    source: Arc<dyn StorageBackend>,
    target: Arc<dyn StorageBackend>,
}

impl MigrationEngine {
    pub fn new(source: Arc<dyn StorageBackend>, target: Arc<dyn StorageBackend>) -> Self {
        Self { source, target }
    }

    /// Copy every note to the target without touching the source.
    pub async fn transfer(&self) -> Result<MigrationReport> {
        // every note would be skipped and then deleted as its own source
        if self.source.handle() == self.target.handle() {
            return Err(VaultError::storage(format!(
                "source and target are the same {}",
                self.source.kind()
            )));
        }
        let source_names = NameCache::load(self.source.as_ref()).await?;
        let target_names = NameCache::load(self.target.as_ref()).await?;
        info!(
            from = %self.source.kind(),
            to = %self.target.kind(),
            notes = source_names.len(),
            existing = target_names.len(),
            "migrating notes"
        );

        // name -> encryption flag of everything in the target, kept current
        // as notes are written
        let mut target: HashMap<String, bool> = target_names
            .names()
            .iter()
            .map(|n| (n.clone(), target_names.is_encrypted(n)))
            .collect();

        let mut report = MigrationReport::default();
        for name in source_names.names() {
            if is_system_note_name(name) {
                continue;
            }
            let encrypted = source_names.is_encrypted(name);
            let source_id = to_physical_name(self.source.kind(), name, encrypted);
            let Some(content) = self.source.read_if_exists(&source_id).await? else {
                warn!(note = %name, "note vanished during migration");
                continue;
            };

            let decision = self.decide(name, &content, &target).await?;
            let entry = MigrationPlanEntry {
                logical_name: name.clone(),
                source_content: content,
                encrypted,
                decision,
            };
            let target_name = self.apply(&entry).await?;
            if entry.decision != MigrationDecision::Skip {
                target.insert(target_name.clone(), encrypted);
            }

            report.notes.push(MigratedNote {
                logical_name: entry.logical_name,
                target_name,
                encrypted,
                decision,
                source_id,
            });
        }

        info!(
            created = report.created(),
            skipped = report.skipped(),
            renamed = report.renamed(),
            "notes copied"
        );
        Ok(report)
    }

    /// Delete the source copy of every note in `report`.
    pub async fn remove_sources(&self, report: &MigrationReport) -> Result<()> {
        for note in &report.notes {
            self.source.delete(&note.source_id).await?;
        }
        debug!(removed = report.notes.len(), "source notes removed");
        Ok(())
    }

    /// Full pass: [`MigrationEngine::transfer`] then [`MigrationEngine::remove_sources`].
    pub async fn run(&self) -> Result<MigrationReport> {
        let report = self.transfer().await?;
        self.remove_sources(&report).await?;
        Ok(report)
    }

    async fn decide(
        &self,
        name: &str,
        content: &[u8],
        target: &HashMap<String, bool>,
    ) -> Result<MigrationDecision> {
        if !target.contains_key(name) {
            return Ok(MigrationDecision::Create);
        }
        if self.target_holds(name, content, target).await? {
            return Ok(MigrationDecision::Skip);
        }

        let mut n = 1;
        loop {
            let candidate = suffixed(name, n);
            if !target.contains_key(&candidate) {
                return Ok(MigrationDecision::CreateWithSuffix(n));
            }
            if self.target_holds(&candidate, content, target).await? {
                return Ok(MigrationDecision::Skip);
            }
            n += 1;
        }
    }

    async fn target_holds(
        &self,
        name: &str,
        content: &[u8],
        target: &HashMap<String, bool>,
    ) -> Result<bool> {
        let encrypted = target.get(name).copied().unwrap_or(false);
        let id = to_physical_name(self.target.kind(), name, encrypted);
        let existing = self.target.read_if_exists(&id).await?;
        Ok(existing.as_deref() == Some(content))
    }

    async fn apply(&self, entry: &MigrationPlanEntry) -> Result<String> {
        let target_name = entry.target_name();
        match entry.decision {
            MigrationDecision::Skip => {
                debug!(note = %entry.logical_name, "same content in target, skipping");
            }
            MigrationDecision::Create | MigrationDecision::CreateWithSuffix(_) => {
                let id = to_physical_name(self.target.kind(), &target_name, entry.encrypted);
                self.target.write(&id, &entry.source_content).await?;
                if target_name != entry.logical_name {
                    info!(
                        note = %entry.logical_name,
                        saved_as = %target_name,
                        "different note with the same name in target"
                    );
                } else {
                    debug!(note = %entry.logical_name, "note created in target");
                }
            }
        }
        Ok(target_name)
    }
}

fn suffixed(name: &str, n: u32) -> String {
    format!("{}-{}", name, n)
}
