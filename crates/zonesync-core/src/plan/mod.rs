// # Diff Planner
//
// Turns a normalized source set and target set into the ordered list of
// mutations that brings the target in line for the configured mode.
//
// ## Modes
//
// - **Full**: delete every target record, then add every source record.
//   The target zone is briefly incomplete between the two phases.
// - **Incremental**: add what is missing, update what drifted, never delete.
// - **Bidirectional**: incremental adds, drifted pairs routed through the
//   [`ConflictResolver`], then deletes for target records with no source.
//
// Target records of unsupported types can never be matched. Full and
// bidirectional modes delete them along with the other unmatched records;
// incremental mode leaves them alone.

pub mod conflict;

pub use conflict::{Conflict, ConflictResolver, FieldDifference, RecordField};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::matcher::{self, Pairing};
use crate::record::{CanonicalRecord, ProviderRef, TargetEntry, TargetListing, UnsupportedEntry};

/// Reconciliation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    #[default]
    Incremental,
    Bidirectional,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            "bidirectional" => Ok(SyncMode::Bidirectional),
            other => Err(Error::config(format!(
                "unknown sync mode '{other}' (expected full, incremental or bidirectional)"
            ))),
        }
    }
}

/// How bidirectional mode settles a drifted pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    SourceWins,
    TargetWins,
    NewestWins,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::SourceWins => "source_wins",
            ConflictStrategy::TargetWins => "target_wins",
            ConflictStrategy::NewestWins => "newest_wins",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    /// Accepts `source_wins` as well as the legacy `cloudflare_wins` spelling
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "source_wins" | "cloudflare_wins" => Ok(ConflictStrategy::SourceWins),
            "target_wins" | "cloudns_wins" => Ok(ConflictStrategy::TargetWins),
            "newest_wins" => Ok(ConflictStrategy::NewestWins),
            other => Err(Error::config(format!("unknown conflict strategy '{other}'"))),
        }
    }
}

/// Mode plus conflict strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncModeConfig {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
}

impl SyncModeConfig {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            conflict_strategy: ConflictStrategy::default(),
        }
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Reject combinations with no defined resolution
    pub fn validate(&self) -> Result<()> {
        if self.mode == SyncMode::Bidirectional && self.conflict_strategy != ConflictStrategy::SourceWins {
            return Err(Error::config(format!(
                "conflict strategy {} is not supported in bidirectional mode",
                self.conflict_strategy.as_str()
            )));
        }
        Ok(())
    }
}

/// Kind of mutation, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Add => "add",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        })
    }
}

/// One planned mutation against the target
#[derive(Debug, Clone)]
pub enum SyncAction {
    /// Create `record` on the target
    Add { record: CanonicalRecord },
    /// Rewrite the target record behind `target` with `record`
    Update {
        record: CanonicalRecord,
        target: ProviderRef,
    },
    /// Remove the target record behind `target`; `record` is its normalized form
    Delete {
        record: CanonicalRecord,
        target: ProviderRef,
    },
    /// Remove a target record whose type has no canonical form
    DeleteUnsupported(UnsupportedEntry),
}

impl SyncAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            SyncAction::Add { .. } => ActionKind::Add,
            SyncAction::Update { .. } => ActionKind::Update,
            SyncAction::Delete { .. } | SyncAction::DeleteUnsupported(_) => ActionKind::Delete,
        }
    }

    /// Normalized record, absent for unsupported target records
    pub fn record(&self) -> Option<&CanonicalRecord> {
        match self {
            SyncAction::Add { record }
            | SyncAction::Update { record, .. }
            | SyncAction::Delete { record, .. } => Some(record),
            SyncAction::DeleteUnsupported(_) => None,
        }
    }

    /// Absolute name of the affected record
    pub fn name(&self) -> &str {
        match self {
            SyncAction::Add { record }
            | SyncAction::Update { record, .. }
            | SyncAction::Delete { record, .. } => record.name(),
            SyncAction::DeleteUnsupported(entry) => &entry.name,
        }
    }

    /// Record type as the provider spells it
    pub fn type_label(&self) -> &str {
        match self {
            SyncAction::Add { record }
            | SyncAction::Update { record, .. }
            | SyncAction::Delete { record, .. } => record.record_type().as_str(),
            SyncAction::DeleteUnsupported(entry) => &entry.record_type,
        }
    }

    /// `"<TYPE> <name>"`
    pub fn identity(&self) -> String {
        format!("{} {}", self.type_label(), self.name())
    }

    fn delete(entry: &TargetEntry) -> Self {
        SyncAction::Delete {
            record: entry.record.clone(),
            target: entry.reference.clone(),
        }
    }
}

/// Compute the ordered action list for `config.mode`
pub fn plan(
    source: &[CanonicalRecord],
    target: &[TargetEntry],
    config: &SyncModeConfig,
) -> Result<Vec<SyncAction>> {
    let actions = match config.mode {
        SyncMode::Full => plan_full(source, target),
        SyncMode::Incremental => plan_incremental(source, target, &matcher::match_sets(source, target)),
        SyncMode::Bidirectional => plan_bidirectional(source, target, config.conflict_strategy)?,
    };

    debug!(
        "Planned {} action(s) in {} mode ({} source, {} target)",
        actions.len(),
        config.mode,
        source.len(),
        target.len()
    );
    Ok(actions)
}

/// Plan against a whole secondary listing, unsupported records included.
///
/// Full mode deletes them after the other deletes and before any add;
/// bidirectional mode deletes them last.
pub fn plan_listing(
    source: &[CanonicalRecord],
    listing: &TargetListing,
    config: &SyncModeConfig,
) -> Result<Vec<SyncAction>> {
    let mut actions = plan(source, &listing.entries, config)?;
    if listing.unsupported.is_empty() {
        return Ok(actions);
    }

    let unsupported = listing.unsupported.iter().cloned().map(SyncAction::DeleteUnsupported);
    match config.mode {
        SyncMode::Full => {
            let adds = actions.split_off(listing.entries.len());
            actions.extend(unsupported);
            actions.extend(adds);
        }
        SyncMode::Bidirectional => actions.extend(unsupported),
        SyncMode::Incremental => {}
    }
    debug!(
        "{} unsupported target record(s) in {} mode",
        listing.unsupported.len(),
        config.mode
    );
    Ok(actions)
}

fn plan_full(source: &[CanonicalRecord], target: &[TargetEntry]) -> Vec<SyncAction> {
    target
        .iter()
        .map(SyncAction::delete)
        .chain(source.iter().map(|record| SyncAction::Add {
            record: record.clone(),
        }))
        .collect()
}

/// Adds and updates in source order
fn plan_incremental(source: &[CanonicalRecord], target: &[TargetEntry], pairing: &Pairing) -> Vec<SyncAction> {
    let mut drifted = pairing.drifted.iter().peekable();
    let mut unmatched = pairing.unmatched_source.iter().peekable();
    let mut actions = Vec::new();

    for (si, record) in source.iter().enumerate() {
        if unmatched.next_if(|&&i| i == si).is_some() {
            actions.push(SyncAction::Add { record: record.clone() });
        } else if let Some(&(_, ti)) = drifted.next_if(|&&(i, _)| i == si) {
            let entry = &target[ti];
            if matcher::needs_update(record, &entry.record) {
                actions.push(SyncAction::Update {
                    record: record.clone(),
                    target: entry.reference.clone(),
                });
            }
        }
    }
    actions
}

fn plan_bidirectional(
    source: &[CanonicalRecord],
    target: &[TargetEntry],
    strategy: ConflictStrategy,
) -> Result<Vec<SyncAction>> {
    let pairing = matcher::match_sets(source, target);

    let mut actions: Vec<SyncAction> = pairing
        .unmatched_source
        .iter()
        .map(|&si| SyncAction::Add {
            record: source[si].clone(),
        })
        .collect();

    let conflicts: Vec<Conflict> = pairing
        .drifted
        .iter()
        .map(|&(si, ti)| Conflict::new(source[si].clone(), target[ti].clone()))
        .collect();
    actions.extend(ConflictResolver::new(strategy).resolve(conflicts)?);

    actions.extend(pairing.unmatched_target.iter().map(|&ti| SyncAction::delete(&target[ti])));
    Ok(actions)
}
