//! Insertion-ordered entity set keyed by identifier
//!
//! First-seen order is the iteration order for every downstream pass.

use indexmap::IndexMap;
use indexmap::map::Entry;

use super::entity::{EntityRecord, EntityStub};

/// Outcome of merging one stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

/// At most one record per identifier
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    records: IndexMap<String, EntityRecord>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from persisted records; repeated identifiers are field-unioned
    pub fn from_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.merge_record(record);
        }
        set
    }

    /// Merge a listing stub: update the existing record's name for the stub's
    /// locale, or insert a new record with only that name populated.
    pub fn merge(&mut self, stub: EntityStub) -> MergeOutcome {
        match self.records.entry(stub.identifier.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(name) = stub.name {
                    entry.get_mut().names.set(stub.locale, name);
                }
                MergeOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(EntityRecord::from_stub(&stub));
                MergeOutcome::Inserted
            }
        }
    }

    /// Merge every stub of one page in page order; returns the number of new records
    pub fn merge_all(&mut self, stubs: impl IntoIterator<Item = EntityStub>) -> usize {
        stubs
            .into_iter()
            .map(|stub| self.merge(stub))
            .filter(|outcome| *outcome == MergeOutcome::Inserted)
            .count()
    }

    /// Field-wise union of a whole record into the set
    pub fn merge_record(&mut self, record: EntityRecord) -> MergeOutcome {
        match self.records.entry(record.identifier.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.names.union_with(&record.names);
                if existing.details.is_empty() {
                    existing.details = record.details;
                }
                MergeOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&EntityRecord> {
        self.records.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityRecord> {
        self.records.values_mut()
    }

    pub fn into_records(self) -> Vec<EntityRecord> {
        self.records.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Locale;

    fn stub(id: &str, locale: Locale, name: Option<&str>) -> EntityStub {
        EntityStub::new(id, locale, name.map(str::to_string))
    }

    #[test]
    fn first_sighting_inserts_with_single_name() {
        let mut set = EntitySet::new();
        assert_eq!(set.merge(stub("/names/a", Locale::Be, Some("Ала"))), MergeOutcome::Inserted);

        let record = set.get("/names/a").unwrap();
        assert_eq!(record.name(Locale::Be), Some("Ала"));
        assert_eq!(record.name(Locale::En), None);
        assert!(record.details.is_empty());
    }

    #[test]
    fn later_locale_fills_existing_record() {
        let mut set = EntitySet::new();
        set.merge(stub("/names/a", Locale::En, Some("Alice")));
        assert_eq!(set.merge(stub("/names/a", Locale::Ru, Some("Алиса"))), MergeOutcome::Updated);

        assert_eq!(set.len(), 1);
        let record = set.get("/names/a").unwrap();
        assert_eq!(record.name(Locale::En), Some("Alice"));
        assert_eq!(record.name(Locale::Ru), Some("Алиса"));
    }

    #[test]
    fn repeat_in_same_locale_overwrites_verbatim() {
        let mut set = EntitySet::new();
        set.merge(stub("/names/a", Locale::En, Some("Alice")));
        set.merge(stub("/names/a", Locale::En, Some("Alice B.")));
        assert_eq!(set.get("/names/a").unwrap().name(Locale::En), Some("Alice B."));
    }

    #[test]
    fn unset_name_never_clears() {
        let mut set = EntitySet::new();
        set.merge(stub("/names/a", Locale::Be, Some("Ала")));
        set.merge(stub("/names/a", Locale::Be, None));
        assert_eq!(set.get("/names/a").unwrap().name(Locale::Be), Some("Ала"));
    }

    #[test]
    fn iteration_follows_first_seen_order() {
        let mut set = EntitySet::new();
        let inserted = set.merge_all(vec![
            stub("/names/c", Locale::En, Some("C")),
            stub("/names/a", Locale::En, Some("A")),
        ]);
        set.merge_all(vec![
            stub("/names/b", Locale::Ru, Some("Б")),
            stub("/names/c", Locale::Ru, Some("Ц")),
        ]);

        assert_eq!(inserted, 2);
        let order: Vec<_> = set.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(order, ["/names/c", "/names/a", "/names/b"]);
    }

    #[test]
    fn from_records_unions_duplicates() {
        let set = EntitySet::from_records(vec![
            EntityRecord::new("/names/x").with_name(Locale::En, "Alice"),
            EntityRecord::new("/names/x").with_name(Locale::Ru, "Алиса"),
        ]);
        assert_eq!(set.len(), 1);
        let record = set.get("/names/x").unwrap();
        assert_eq!(record.name(Locale::En), Some("Alice"));
        assert_eq!(record.name(Locale::Ru), Some("Алиса"));
    }
}
