//! Record equivalence and cross-provider pairing
//!
//! Two thresholds share one boundary: records whose TTLs differ by at most
//! [`TTL_TOLERANCE_SECS`] are equivalent, and a pair needs an update only when
//! the difference exceeds it.

use tracing::warn;

use crate::record::{CanonicalRecord, TargetEntry};

/// Largest TTL difference (seconds) still treated as equal
pub const TTL_TOLERANCE_SECS: u32 = 60;

/// Case-insensitive name comparison ignoring a trailing dot
pub fn names_equivalent(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Same type at the same name; the identity used for drift and deletes
pub fn same_identity(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    a.record_type() == b.record_type() && names_equivalent(a.name(), b.name())
}

fn fields_equal(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    if !a.record_type().compares_fields() {
        return true;
    }
    let (fa, fb) = (a.fields(), b.fields());
    fa.priority() == fb.priority() && fa.weight() == fb.weight() && fa.port() == fb.port()
}

/// Whether `a` and `b` describe the same record closely enough to need no action
pub fn equivalent(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    same_identity(a, b)
        && a.content() == b.content()
        && a.ttl().abs_diff(b.ttl()) <= TTL_TOLERANCE_SECS
        && fields_equal(a, b)
}

/// Whether the target copy of a matched pair must be rewritten from the source
pub fn needs_update(source: &CanonicalRecord, target: &CanonicalRecord) -> bool {
    source.content() != target.content()
        || source.ttl().abs_diff(target.ttl()) > TTL_TOLERANCE_SECS
        || !fields_equal(source, target)
}

/// First candidate equivalent to `record`
pub fn find_match<'a>(record: &CanonicalRecord, candidates: &'a [TargetEntry]) -> Option<&'a TargetEntry> {
    candidates.iter().find(|c| equivalent(record, &c.record))
}

/// Result of pairing a source set against a target set.
///
/// Indices refer to the input slices and keep input order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// `(source, target)` pairs that are equivalent
    pub in_sync: Vec<(usize, usize)>,
    /// `(source, target)` pairs with the same identity that are not equivalent
    pub drifted: Vec<(usize, usize)>,
    /// Source records with no counterpart
    pub unmatched_source: Vec<usize>,
    /// Target records no source record claimed
    pub unmatched_target: Vec<usize>,
}

/// Pair every source record with at most one target record.
///
/// Equivalent counterparts are claimed first, so an exact copy is never
/// stolen by a drifted record of the same identity. Among several qualifying
/// candidates the first unclaimed one in target order wins.
pub fn match_sets(source: &[CanonicalRecord], target: &[TargetEntry]) -> Pairing {
    let mut claimed = vec![false; target.len()];
    let mut matched = vec![None; source.len()];
    let mut pairing = Pairing::default();

    for (si, record) in source.iter().enumerate() {
        if let Some(ti) = claim(record, target, &mut claimed, equivalent) {
            matched[si] = Some(ti);
            pairing.in_sync.push((si, ti));
        }
    }

    for (si, record) in source.iter().enumerate() {
        if matched[si].is_some() {
            continue;
        }
        match claim(record, target, &mut claimed, same_identity) {
            Some(ti) => pairing.drifted.push((si, ti)),
            None => pairing.unmatched_source.push(si),
        }
    }

    pairing.in_sync.sort_unstable();
    pairing.unmatched_target = claimed
        .iter()
        .enumerate()
        .filter_map(|(ti, taken)| (!taken).then_some(ti))
        .collect();
    pairing
}

fn claim(
    record: &CanonicalRecord,
    target: &[TargetEntry],
    claimed: &mut [bool],
    predicate: fn(&CanonicalRecord, &CanonicalRecord) -> bool,
) -> Option<usize> {
    let mut candidates = target
        .iter()
        .enumerate()
        .filter(|(ti, entry)| !claimed[*ti] && predicate(record, &entry.record))
        .map(|(ti, _)| ti);

    let first = candidates.next()?;
    let others = candidates.count();
    if others > 0 {
        warn!(
            "{} has {} equally matching target records, using id {}",
            record.identity(),
            others + 1,
            target[first].reference.id
        );
    }
    claimed[first] = true;
    Some(first)
}
