//! ID uniqueness and contiguity tracking
//!
//! A registry is an explicit accumulator owned by one marshalling pass and
//! scoped to one container; nothing here is global state.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Tracks which type claimed each ID while a table set is being read
#[derive(Debug)]
pub struct IdRegistry {
    kind: &'static str,
    claimed: BTreeMap<i64, String>,
}

impl IdRegistry {
    /// Create a registry for one ID scope ("parameter", "entity", ...)
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            claimed: BTreeMap::new(),
        }
    }

    /// Claim an ID for a type, failing if any type already holds it
    pub fn claim(&mut self, id: i64, type_name: &str) -> Result<()> {
        if let Some(existing) = self.claimed.get(&id) {
            return Err(Error::DuplicateId {
                kind: self.kind,
                type_name: type_name.to_string(),
                id,
                existing: existing.clone(),
            });
        }
        self.claimed.insert(id, type_name.to_string());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Verify the claimed ID set is dense from 0.
    ///
    /// An empty registry passes: an absent table set is a valid empty
    /// collection.
    pub fn check_contiguous(&self) -> Result<()> {
        if self.claimed.is_empty() {
            return Ok(());
        }
        let ids: BTreeSet<i64> = self.claimed.keys().copied().collect();
        check_contiguous(self.kind, &ids)
    }
}

/// Verify an ID set is dense from 0, enumerating every missing ID in
/// ascending order otherwise
pub fn check_contiguous(kind: &'static str, ids: &BTreeSet<i64>) -> Result<()> {
    let sorted: Vec<i64> = ids.iter().copied().collect();
    let mut missing: Vec<i64> = Vec::new();
    if let Some(&first) = sorted.first() {
        missing.extend(0..first);
    }
    for pair in sorted.windows(2) {
        if pair[1] != pair[0] + 1 {
            missing.extend(pair[0] + 1..pair[1]);
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::NonContiguousIds {
        kind,
        missing: missing
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_detects_duplicates() {
        let mut reg = IdRegistry::new("parameter");
        reg.claim(0, "A").unwrap();
        reg.claim(1, "A").unwrap();

        let err = reg.claim(0, "B").unwrap_err();
        match err {
            Error::DuplicateId {
                id,
                type_name,
                existing,
                ..
            } => {
                assert_eq!(id, 0);
                assert_eq!(type_name, "B");
                assert_eq!(existing, "A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_contiguous_ok() {
        let mut reg = IdRegistry::new("parameter");
        for id in [2, 0, 1] {
            reg.claim(id, "A").unwrap();
        }
        reg.check_contiguous().unwrap();
    }

    #[test]
    fn test_contiguous_enumerates_every_gap() {
        let ids: BTreeSet<i64> = [0, 3, 6].into_iter().collect();
        let err = check_contiguous("asset", &ids).unwrap_err();
        match err {
            Error::NonContiguousIds { missing, .. } => assert_eq!(missing, "1, 2, 4, 5"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_contiguous_reports_leading_gap() {
        let ids: BTreeSet<i64> = [2, 3].into_iter().collect();
        let err = check_contiguous("path", &ids).unwrap_err();
        match err {
            Error::NonContiguousIds { missing, .. } => assert_eq!(missing, "0, 1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_registry_passes() {
        IdRegistry::new("entity").check_contiguous().unwrap();
    }
}
