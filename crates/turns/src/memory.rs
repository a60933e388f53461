//! The memory merge buffer: a monotonically-consistent projection of
//! server-pushed retrieval deltas.
//!
//! The server trims and adds memories as its token budget shifts; the
//! client only mirrors what it is told.  Flat (no entity) and per-entity
//! partitions coexist, selected per incoming event by the presence of its
//! entity id — not by conversation mode — so mixed histories render
//! correctly.

use pl_domain::chat::MemoryItem;
use pl_domain::trace::TraceEvent;

/// One entity's partition of the visible memory set.
#[derive(Debug, Clone)]
pub struct EntityMemories {
    pub entity_id: String,
    /// Display label, kept from the first event that named one.
    pub label: Option<String>,
    pub items: Vec<MemoryItem>,
}

/// The currently-displayed memory set.
#[derive(Debug, Clone, Default)]
pub struct MemoryMergeBuffer {
    flat: Vec<MemoryItem>,
    /// Per-entity partitions in first-seen order.
    by_entity: Vec<EntityMemories>,
}

impl MemoryMergeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `memories` event: trim ids, then add new items.
    ///
    /// Trims run strictly before adds from the same event.  Adds skip ids
    /// already present, so redelivery of the same event is idempotent.
    /// No entry is ever mutated in place; every update removes or appends
    /// whole objects.
    pub fn apply(
        &mut self,
        entity_id: Option<&str>,
        entity_label: Option<&str>,
        trimmed: &[String],
        added: Vec<MemoryItem>,
    ) {
        let trimmed_count = trimmed.len();
        let added_count = added.len();

        let list = match entity_id {
            Some(id) => {
                let partition = self.partition_mut(id, entity_label);
                &mut partition.items
            }
            None => &mut self.flat,
        };

        list.retain(|m| !trimmed.contains(&m.id));

        for item in added {
            if !list.iter().any(|m| m.id == item.id) {
                list.push(item);
            }
        }

        TraceEvent::MemoryDeltaApplied {
            entity_id: entity_id.map(str::to_string),
            trimmed: trimmed_count,
            added: added_count,
        }
        .emit();
    }

    fn partition_mut(&mut self, entity_id: &str, label: Option<&str>) -> &mut EntityMemories {
        if let Some(idx) = self.by_entity.iter().position(|p| p.entity_id == entity_id) {
            let partition = &mut self.by_entity[idx];
            if partition.label.is_none() {
                partition.label = label.map(str::to_string);
            }
            return partition;
        }

        let idx = self.by_entity.len();
        self.by_entity.push(EntityMemories {
            entity_id: entity_id.to_string(),
            label: label.map(str::to_string),
            items: Vec::new(),
        });
        &mut self.by_entity[idx]
    }

    /// Memories with no owning entity.
    pub fn flat(&self) -> &[MemoryItem] {
        &self.flat
    }

    /// Per-entity partitions, in first-seen order.
    pub fn entities(&self) -> &[EntityMemories] {
        &self.by_entity
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.by_entity.iter().all(|p| p.items.is_empty())
    }

    pub fn total_len(&self) -> usize {
        self.flat.len() + self.by_entity.iter().map(|p| p.items.len()).sum::<usize>()
    }

    /// Drop everything, e.g. when switching conversations.
    pub fn clear(&mut self) {
        self.flat.clear();
        self.by_entity.clear();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(id: &str) -> MemoryItem {
        MemoryItem {
            id: id.to_string(),
            role: "human".into(),
            content: format!("content of {id}"),
            score: Some(0.8),
            retrieval_count: 1,
            entity_id: None,
        }
    }

    #[test]
    fn adds_land_in_flat_list_without_entity() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a"), mem("b")]);
        assert_eq!(buf.flat().len(), 2);
        assert!(buf.entities().is_empty());
    }

    #[test]
    fn adds_partition_by_entity_id() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(Some("ent-a"), Some("Archivist"), &[], vec![mem("a")]);
        buf.apply(Some("ent-b"), Some("Builder"), &[], vec![mem("b")]);

        assert!(buf.flat().is_empty());
        assert_eq!(buf.entities().len(), 2);
        assert_eq!(buf.entities()[0].entity_id, "ent-a");
        assert_eq!(buf.entities()[0].label.as_deref(), Some("Archivist"));
        assert_eq!(buf.entities()[1].items[0].id, "b");
    }

    #[test]
    fn mixed_flat_and_partitioned_events_coexist() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("flat1")]);
        buf.apply(Some("ent-a"), None, &[], vec![mem("a1")]);

        assert_eq!(buf.flat().len(), 1);
        assert_eq!(buf.entities().len(), 1);
        assert_eq!(buf.total_len(), 2);
    }

    #[test]
    fn trim_removes_matching_ids() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a"), mem("b"), mem("c")]);
        buf.apply(None, None, &["a".into(), "c".into()], vec![]);

        let ids: Vec<&str> = buf.flat().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn trim_applies_before_add_within_one_event() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a")]);

        // One event that both trims "a" and re-adds it: the add must win,
        // because the trim runs first.
        buf.apply(None, None, &["a".into()], vec![mem("a")]);
        assert_eq!(buf.flat().len(), 1);
        assert_eq!(buf.flat()[0].id, "a");
    }

    #[test]
    fn reapplying_the_same_event_is_idempotent() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a"), mem("b")]);

        let trimmed = vec!["a".to_string()];
        let added = vec![mem("c")];
        buf.apply(None, None, &trimmed, added.clone());
        let after_once: Vec<String> = buf.flat().iter().map(|m| m.id.clone()).collect();

        buf.apply(None, None, &trimmed, added);
        let after_twice: Vec<String> = buf.flat().iter().map(|m| m.id.clone()).collect();

        assert_eq!(after_once, after_twice);
        assert_eq!(after_twice, vec!["b", "c"]);
    }

    #[test]
    fn duplicate_add_is_skipped() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a")]);
        buf.apply(None, None, &[], vec![mem("a")]);
        assert_eq!(buf.flat().len(), 1);
    }

    #[test]
    fn trim_only_touches_the_addressed_partition() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(Some("ent-a"), None, &[], vec![mem("x")]);
        buf.apply(None, None, &[], vec![mem("x")]);

        // Trimming "x" from ent-a leaves the flat "x" alone.
        buf.apply(Some("ent-a"), None, &["x".into()], vec![]);
        assert!(buf.entities()[0].items.is_empty());
        assert_eq!(buf.flat().len(), 1);
    }

    #[test]
    fn label_kept_from_first_event_that_named_one() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(Some("ent-a"), None, &[], vec![mem("a")]);
        assert!(buf.entities()[0].label.is_none());

        buf.apply(Some("ent-a"), Some("Archivist"), &[], vec![mem("b")]);
        assert_eq!(buf.entities()[0].label.as_deref(), Some("Archivist"));
    }

    #[test]
    fn clear_empties_everything() {
        let mut buf = MemoryMergeBuffer::new();
        buf.apply(None, None, &[], vec![mem("a")]);
        buf.apply(Some("ent-a"), None, &[], vec![mem("b")]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_len(), 0);
    }
}
