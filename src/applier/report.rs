//! # Apply Report
//!
//! Per-resource outcomes of a batch apply or delete.

use crate::resource::{DocumentRef, ObjectKey};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    /// The merger found nothing to change
    Unchanged,
    Deleted,
    /// Delete found nothing to remove
    Absent,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Unchanged => "unchanged",
            ApplyOutcome::Deleted => "deleted",
            ApplyOutcome::Absent => "absent",
        }
    }

    /// Whether the store was written to
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Created | ApplyOutcome::Updated | ApplyOutcome::Deleted
        )
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedResource {
    pub document: DocumentRef,
    pub key: ObjectKey,
    pub outcome: ApplyOutcome,
}

/// Resources handled by one call, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub resources: Vec<AppliedResource>,
}

impl ApplyReport {
    pub(crate) fn push(&mut self, document: DocumentRef, key: ObjectKey, outcome: ApplyOutcome) {
        self.resources.push(AppliedResource {
            document,
            key,
            outcome,
        });
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn count(&self, outcome: ApplyOutcome) -> usize {
        self.resources
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    /// True when nothing was written to the store
    pub fn is_noop(&self) -> bool {
        !self.resources.iter().any(|r| r.outcome.is_write())
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.resources.iter().map(|r| &r.key)
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} deleted",
            self.count(ApplyOutcome::Created),
            self.count(ApplyOutcome::Updated),
            self.count(ApplyOutcome::Unchanged),
            self.count(ApplyOutcome::Deleted)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(GroupVersionKind::gvk("", "v1", "ConfigMap"), None, name)
    }

    #[test]
    fn test_counts_and_noop() {
        let mut report = ApplyReport::default();
        assert!(report.is_noop());

        report.push(DocumentRef::new("a.yaml", 0), key("a"), ApplyOutcome::Unchanged);
        assert!(report.is_noop());

        report.push(DocumentRef::new("b.yaml", 0), key("b"), ApplyOutcome::Created);
        assert!(!report.is_noop());
        assert_eq!(report.count(ApplyOutcome::Created), 1);
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_string(),
            "1 created, 0 updated, 1 unchanged, 0 deleted"
        );
        assert_eq!(
            report.keys().map(|k| k.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
