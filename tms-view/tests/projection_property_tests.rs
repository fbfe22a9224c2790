use proptest::prelude::*;
use tms_core::{ApplicationStatus, FeeType, OpportunityId, RecordIdType};
use tms_test_utils::generators::{arb_applications, arb_fee_type, arb_recognitions};
use tms_view::{
    by_application_status, by_fee_type, by_opportunity, order_applications, FilterChain, ShowMore,
};

proptest! {
    #[test]
    fn pending_always_precede_settled(apps in arb_applications(20)) {
        let ordered = order_applications(&apps);
        prop_assert_eq!(ordered.len(), apps.len());
        let first_settled = ordered
            .iter()
            .position(|a| a.status != ApplicationStatus::Pending)
            .unwrap_or(ordered.len());
        prop_assert!(ordered[first_settled..]
            .iter()
            .all(|a| a.status != ApplicationStatus::Pending));
    }

    #[test]
    fn groups_are_newest_first(apps in arb_applications(20)) {
        let ordered = order_applications(&apps);
        for pair in ordered.windows(2) {
            if pair[0].status == pair[1].status {
                prop_assert!(pair[0].created_at >= pair[1].created_at);
            }
        }
    }

    #[test]
    fn filter_order_does_not_matter(
        apps in arb_applications(20),
        pick in 0usize..3,
    ) {
        let opportunity = OpportunityId::new(format!("opp-{}", pick));
        let forward = FilterChain::new()
            .with(by_opportunity(opportunity.clone()))
            .with(by_application_status(ApplicationStatus::Pending));
        let backward = FilterChain::new()
            .with(by_application_status(ApplicationStatus::Pending))
            .with(by_opportunity(opportunity));

        let a: Vec<&str> = forward.apply(&apps).into_iter().map(|x| x.id.as_str()).collect();
        let b: Vec<&str> = backward.apply(&apps).into_iter().map(|x| x.id.as_str()).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn fee_type_filter_keeps_only_that_type(records in arb_recognitions(15), fee_type in arb_fee_type()) {
        let chain = FilterChain::new().with(by_fee_type(fee_type));
        let kept = chain.apply(&records);
        prop_assert!(kept.iter().all(|r| r.fee_type == fee_type));
        let expected = records.iter().filter(|r| r.fee_type == fee_type).count();
        prop_assert_eq!(kept.len(), expected);
    }

    #[test]
    fn show_more_partitions_the_list(len in 0usize..30, expanded in any::<bool>()) {
        let items: Vec<usize> = (0..len).collect();
        let paging = ShowMore { expanded, ..ShowMore::default() };
        prop_assert_eq!(paging.visible(&items).len() + paging.hidden_count(len), len);
    }
}

#[test]
fn free_agreements_never_match_equity_filter() {
    let chain = FilterChain::new().with(by_fee_type(FeeType::Equity));
    let records = vec![tms_test_utils::fixtures::recognition_record(
        "r-1",
        FeeType::Free,
        tms_core::RecognitionStatus::Pending,
    )];
    assert!(chain.apply(&records).is_empty());
}
