//! Merge laws of the entity set under arbitrary listing sequences
use std::collections::{HashMap, HashSet};

use directory_crawler_lib::domain::{EntitySet, EntityStub, Locale, MergeOutcome};
use proptest::prelude::*;
use rstest::rstest;

fn locale() -> impl Strategy<Value = Locale> {
    prop_oneof![Just(Locale::En), Just(Locale::Be), Just(Locale::Ru)]
}

fn stub() -> impl Strategy<Value = EntityStub> {
    (0u8..12, locale(), proptest::option::of("[a-z]{1,6}"))
        .prop_map(|(id, locale, name)| EntityStub::new(format!("/names/{id}"), locale, name))
}

proptest! {
    #[test]
    fn identifiers_are_unique_and_in_first_seen_order(stubs in proptest::collection::vec(stub(), 0..64)) {
        let mut set = EntitySet::new();
        set.merge_all(stubs.clone());

        let mut seen = HashSet::new();
        let first_seen: Vec<_> = stubs
            .iter()
            .filter(|s| seen.insert(s.identifier.clone()))
            .map(|s| s.identifier.clone())
            .collect();
        let order: Vec<_> = set.iter().map(|r| r.identifier.clone()).collect();
        prop_assert_eq!(order, first_seen);
    }

    #[test]
    fn each_name_is_the_last_one_listed(stubs in proptest::collection::vec(stub(), 0..64)) {
        let mut set = EntitySet::new();
        set.merge_all(stubs.clone());

        let mut expected: HashMap<(String, Locale), String> = HashMap::new();
        for s in &stubs {
            if let Some(name) = &s.name {
                expected.insert((s.identifier.clone(), s.locale), name.clone());
            }
        }

        for record in set.iter() {
            for locale in Locale::ALL {
                let want = expected.get(&(record.identifier.clone(), locale)).map(String::as_str);
                prop_assert_eq!(record.name(locale), want);
            }
        }
    }
}

#[rstest]
#[case::new_identifier(None, MergeOutcome::Inserted)]
#[case::known_identifier(Some(Locale::En), MergeOutcome::Updated)]
#[case::known_in_other_locale(Some(Locale::Ru), MergeOutcome::Updated)]
fn merge_outcome(#[case] seeded: Option<Locale>, #[case] expected: MergeOutcome) {
    let mut set = EntitySet::new();
    if let Some(locale) = seeded {
        set.merge(EntityStub::new("/names/x", locale, Some("seed".to_string())));
    }
    let outcome = set.merge(EntityStub::new("/names/x", Locale::Be, Some("Ала".to_string())));
    assert_eq!(outcome, expected);
    assert_eq!(set.len(), 1);
}
