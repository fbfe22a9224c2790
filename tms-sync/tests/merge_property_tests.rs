use proptest::prelude::*;
use tms_core::{Application, ApplicationId, Reconcilable, RecordIdType, Timestamp};
use tms_sync::{incoming_wins, MessageLog, RecordStore};
use tms_test_utils::fixtures::message;
use tms_test_utils::generators::arb_application_versions;
use tms_test_utils::ts;

fn apply_all(versions: &[Application]) -> Option<Application> {
    let untimed: Vec<_> = versions.iter().map(|v| (v.clone(), None)).collect();
    apply_committed(&untimed)
}

fn apply_committed(events: &[(Application, Option<Timestamp>)]) -> Option<Application> {
    let mut store: RecordStore<Application> = RecordStore::new();
    for (version, committed_at) in events {
        store.apply_upsert(version.clone(), *committed_at).ok()?;
    }
    store.get(&ApplicationId::new("app-0")).cloned()
}

proptest! {
    #[test]
    fn newest_timestamp_always_survives(mut versions in arb_application_versions(8)) {
        for (i, version) in versions.iter_mut().enumerate() {
            version.updated_at = Some(ts(i as i64 * 7));
        }
        let newest = versions.last().cloned().unwrap();
        versions.reverse();
        let merged = apply_all(&versions).unwrap();
        prop_assert_eq!(merged.updated_at, newest.updated_at);
        prop_assert_eq!(merged.status, newest.status);
    }

    #[test]
    fn untimed_merge_keeps_most_settled_status(mut versions in arb_application_versions(8)) {
        for version in versions.iter_mut() {
            version.updated_at = None;
        }
        let max_rank = versions.iter().map(|v| v.settlement_rank()).max().unwrap();
        let merged = apply_all(&versions).unwrap();
        prop_assert_eq!(merged.settlement_rank(), max_rank);
    }

    #[test]
    fn latest_commit_wins_for_rows_without_updated_at(mut versions in arb_application_versions(8)) {
        for version in versions.iter_mut() {
            version.updated_at = None;
        }
        let newest = versions.last().cloned().unwrap();
        let mut events: Vec<_> = versions
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, Some(ts(i as i64 * 7))))
            .collect();
        events.reverse();
        let merged = apply_committed(&events).unwrap();
        prop_assert_eq!(merged.status, newest.status);
        prop_assert_eq!(merged.diligence_status, newest.diligence_status);
    }

    #[test]
    fn redelivery_is_idempotent(mut versions in arb_application_versions(6)) {
        for version in versions.iter_mut() {
            version.updated_at = None;
        }
        let once = apply_all(&versions);
        let mut twice = versions.clone();
        twice.extend(versions.iter().cloned());
        prop_assert_eq!(apply_all(&twice), once);
    }

    #[test]
    fn incoming_wins_is_reflexive(versions in arb_application_versions(1)) {
        let record = &versions[0];
        prop_assert!(incoming_wins(record, record));
    }

    #[test]
    fn message_redelivery_never_duplicates(copies in 1usize..10) {
        let mut log = MessageLog::default();
        for _ in 0..copies {
            let _ = log.apply_insert(message("m-1", "founder-1", "hello", ts(0)));
        }
        prop_assert_eq!(log.len(), 1);
    }
}
