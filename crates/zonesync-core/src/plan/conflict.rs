//! Conflict resolution for bidirectional sync
//!
//! A conflict is a source/target pair with the same identity whose contents
//! disagree. Only [`ConflictStrategy::SourceWins`] has a defined outcome.

use serde::Serialize;
use tracing::{info, warn};

use super::{ConflictStrategy, SyncAction};
use crate::error::{Error, Result};
use crate::matcher::TTL_TOLERANCE_SECS;
use crate::record::{CanonicalRecord, TargetEntry};

/// Field that differs between the two sides of a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Content,
    Ttl,
    Priority,
    Weight,
    Port,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDifference {
    pub field: RecordField,
    pub source: String,
    pub target: String,
}

/// Matched-but-different pair
#[derive(Debug, Clone)]
pub struct Conflict {
    pub source: CanonicalRecord,
    pub target: TargetEntry,
    pub differences: Vec<FieldDifference>,
}

impl Conflict {
    pub fn new(source: CanonicalRecord, target: TargetEntry) -> Self {
        let differences = differences(&source, &target.record);
        Self {
            source,
            target,
            differences,
        }
    }
}

/// Fields on which `source` and `target` disagree, using the same TTL
/// tolerance as the matcher
pub fn differences(source: &CanonicalRecord, target: &CanonicalRecord) -> Vec<FieldDifference> {
    let mut out = Vec::new();
    let mut push = |field, s: String, t: String| {
        if s != t {
            out.push(FieldDifference {
                field,
                source: s,
                target: t,
            });
        }
    };

    push(RecordField::Content, source.content().to_string(), target.content().to_string());
    if source.ttl().abs_diff(target.ttl()) > TTL_TOLERANCE_SECS {
        push(RecordField::Ttl, source.ttl().to_string(), target.ttl().to_string());
    }
    if source.record_type().compares_fields() {
        let (s, t) = (source.fields(), target.fields());
        let show = |v: Option<u16>| v.map(|v| v.to_string()).unwrap_or_default();
        push(RecordField::Priority, show(s.priority()), show(t.priority()));
        push(RecordField::Weight, show(s.weight()), show(t.weight()));
        push(RecordField::Port, show(s.port()), show(t.port()));
    }
    out
}

/// Applies a [`ConflictStrategy`] to drifted pairs
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    strategy: ConflictStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self { strategy }
    }

    /// Resolve every conflict, in input order.
    ///
    /// An empty input never fails, whatever the strategy.
    pub fn resolve(&self, conflicts: Vec<Conflict>) -> Result<Vec<SyncAction>> {
        if conflicts.is_empty() {
            return Ok(Vec::new());
        }

        match self.strategy {
            ConflictStrategy::SourceWins => Ok(conflicts
                .into_iter()
                .map(|conflict| {
                    info!(
                        "Conflict on {} resolved in favour of source: {:?}",
                        conflict.source.identity(),
                        conflict.differences
                    );
                    SyncAction::Update {
                        record: conflict.source,
                        target: conflict.target.reference,
                    }
                })
                .collect()),
            strategy @ (ConflictStrategy::TargetWins | ConflictStrategy::NewestWins) => {
                warn!(
                    "{} conflict(s) left unresolved: strategy {} is not supported",
                    conflicts.len(),
                    strategy.as_str()
                );
                Err(Error::UnsupportedConflictStrategy(strategy))
            }
        }
    }
}
