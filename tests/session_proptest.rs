//! Property-based tests for the session cap and the delivery status machine

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;
use xfchat::backend::messaging::{aggregate_status, transition, Transition};
use xfchat::backend::sessions::{SessionList, MAX_SESSIONS_PER_USER};
use xfchat::shared::messaging::{DeliveryStatus, DeviceMeta, Session, StatusEntry};

fn status_strategy() -> impl Strategy<Value = DeliveryStatus> {
    prop_oneof![
        Just(DeliveryStatus::Sent),
        Just(DeliveryStatus::Delivered),
        Just(DeliveryStatus::Read),
    ]
}

fn session(n: usize, offset_secs: i64) -> Session {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Session::new(
        format!("device-{}", n),
        base + Duration::seconds(offset_secs),
        DeviceMeta::default(),
    )
}

proptest! {
    #[test]
    fn test_session_list_never_exceeds_cap(count in 0usize..20) {
        let mut list = SessionList::default();
        let mut evicted = Vec::new();
        for n in 0..count {
            evicted.extend(list.insert(session(n, n as i64)));
            prop_assert!(list.len() <= MAX_SESSIONS_PER_USER);
        }

        // Survivors are exactly the newest logins, oldest first
        let kept: Vec<String> = list.iter().map(|s| s.device_id.clone()).collect();
        let expected: Vec<String> = (count.saturating_sub(MAX_SESSIONS_PER_USER)..count)
            .map(|n| format!("device-{}", n))
            .collect();
        prop_assert_eq!(kept, expected);
        prop_assert_eq!(evicted.len(), count.saturating_sub(MAX_SESSIONS_PER_USER));
    }

    #[test]
    fn test_rebuilt_list_is_sorted(offsets in prop::collection::vec(0i64..1000, 0..4)) {
        let list = SessionList::from_sessions(
            offsets.iter().enumerate().map(|(n, offset)| session(n, *offset)),
        );
        let times: Vec<_> = list.iter().map(|s| s.login_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        prop_assert_eq!(times, sorted);
    }

    #[test]
    fn test_status_never_regresses(
        start in status_strategy(),
        targets in prop::collection::vec(status_strategy(), 0..10),
    ) {
        let mut current = start;
        for target in &targets {
            match transition(current, *target) {
                Transition::Advanced { from, to } => {
                    prop_assert_eq!(from, current);
                    prop_assert!(to > from);
                    current = to;
                }
                Transition::Unchanged(status) => {
                    prop_assert_eq!(status, current);
                    prop_assert!(*target <= current);
                }
            }
        }
        let highest = targets.iter().copied().fold(start, DeliveryStatus::max);
        prop_assert_eq!(current, highest);
    }

    #[test]
    fn test_marking_read_twice_is_a_noop(start in status_strategy()) {
        let first = transition(start, DeliveryStatus::Read);
        let after = match first {
            Transition::Advanced { to, .. } => to,
            Transition::Unchanged(status) => status,
        };
        prop_assert_eq!(after, DeliveryStatus::Read);
        prop_assert_eq!(
            transition(after, DeliveryStatus::Read),
            Transition::Unchanged(DeliveryStatus::Read)
        );
    }

    #[test]
    fn test_aggregate_is_the_laggard(statuses in prop::collection::vec(status_strategy(), 1..8)) {
        let entries: Vec<StatusEntry> = statuses
            .iter()
            .map(|status| StatusEntry {
                user_id: Uuid::new_v4(),
                status: *status,
                timestamp: Utc::now(),
            })
            .collect();
        let expected = statuses.iter().copied().min().unwrap();
        prop_assert_eq!(aggregate_status(&entries), expected);
    }
}
