use docsift_core::DocumentFilter;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn arb_filter() -> impl Strategy<Value = DocumentFilter> {
    prop_oneof![
        Just(DocumentFilter::Unset),
        Just(DocumentFilter::MatchesNone),
        prop::collection::btree_set("[a-e]", 1..5).prop_map(DocumentFilter::Ids),
    ]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn intersect_is_commutative(a in arb_filter(), b in arb_filter()) {
        prop_assert_eq!(a.clone().intersect(b.clone()), b.intersect(a));
    }

    #[test]
    fn intersect_admits_only_what_both_admit(
        a in arb_filter(),
        b in arb_filter(),
        id in "[a-f]",
    ) {
        let both = a.admits(&id) && b.admits(&id);
        prop_assert_eq!(a.intersect(b).admits(&id), both);
    }

    #[test]
    fn intersect_never_yields_empty_id_set(a in arb_filter(), b in arb_filter()) {
        if let DocumentFilter::Ids(ids) = a.intersect(b) {
            prop_assert!(!ids.is_empty());
        }
    }

    #[test]
    fn resolved_matches_input_membership(ids in prop::collection::vec("[a-e]", 0..6), probe in "[a-f]") {
        let set: BTreeSet<String> = ids.iter().cloned().collect();
        let filter = DocumentFilter::resolved(ids);
        prop_assert_eq!(filter.admits(&probe), set.contains(&probe));
        prop_assert_eq!(filter.matches_none(), set.is_empty());
    }
}
