// Queue projection suite: ordering, wait buckets, grouping and summary as
// seen through the coordinator's read operations.

mod common;

use chrono::Duration;
use proptest::prelude::*;
use uuid::Uuid;

use chairflow::{Actor, Clock, FlowListFilter, FlowStage, Priority, WaitStatus};
use common::Harness;

#[tokio::test]
async fn test_priority_tier_beats_arrival_order() {
    let harness = Harness::new();

    let normal_first = harness.check_in(Priority::Normal).await;
    harness.clock.advance(Duration::minutes(5));
    let urgent_late = harness.check_in(Priority::Urgent).await;
    harness.clock.advance(Duration::minutes(5));
    let normal_last = harness.check_in(Priority::Normal).await;

    let projection = harness.coordinator.list_queue(None, None).await;
    let order: Vec<Uuid> = projection
        .queue
        .iter()
        .map(|entry| entry.appointment_id)
        .collect();
    // Urgent jumps the queue; equal tiers stay FIFO by check-in.
    assert_eq!(order, vec![urgent_late, normal_first, normal_last]);
}

#[tokio::test]
async fn test_wait_status_bucket_boundaries() {
    let harness = Harness::new();

    let at_31 = harness.check_in(Priority::Normal).await;
    harness.clock.advance(Duration::minutes(1));
    let at_30 = harness.check_in(Priority::Normal).await;
    harness.clock.advance(Duration::minutes(15));
    let at_15 = harness.check_in(Priority::Normal).await;
    harness.clock.advance(Duration::minutes(1));
    let at_14 = harness.check_in(Priority::Normal).await;
    harness.clock.advance(Duration::minutes(14));

    let projection = harness.coordinator.list_queue(None, None).await;
    let status_of = |appointment_id: Uuid| {
        projection
            .queue
            .iter()
            .find(|entry| entry.appointment_id == appointment_id)
            .unwrap()
            .wait_status
    };
    assert_eq!(status_of(at_14), WaitStatus::Normal);
    assert_eq!(status_of(at_15), WaitStatus::Warning);
    assert_eq!(status_of(at_30), WaitStatus::Warning);
    assert_eq!(status_of(at_31), WaitStatus::Critical);
}

#[tokio::test]
async fn test_grouping_follows_stage_buckets() {
    let harness = Harness::new();

    let checked_in = harness.check_in(Priority::Normal).await;
    let waiting = harness.check_in(Priority::Normal).await;
    let called = harness.check_in(Priority::Normal).await;
    let now = harness.clock.now();
    harness
        .flow_store
        .commit_advance(waiting, FlowStage::Waiting, now, None)
        .await
        .unwrap();
    harness
        .flow_store
        .commit_advance(called, FlowStage::Waiting, now, None)
        .await
        .unwrap();
    harness
        .flow_store
        .commit_advance(called, FlowStage::Called, now, None)
        .await
        .unwrap();

    let projection = harness.coordinator.list_queue(None, None).await;
    assert_eq!(projection.grouped.checked_in.len(), 1);
    assert_eq!(projection.grouped.waiting.len(), 1);
    assert_eq!(projection.grouped.called.len(), 1);
    assert_eq!(projection.grouped.checked_in[0].appointment_id, checked_in);
    assert_eq!(projection.grouped.waiting[0].appointment_id, waiting);
    assert_eq!(projection.grouped.called[0].appointment_id, called);

    assert_eq!(projection.summary.total, 3);
    assert_eq!(projection.summary.checked_in_count, 1);
    assert_eq!(projection.summary.waiting_count, 1);
    assert_eq!(projection.summary.called_count, 1);
}

#[tokio::test]
async fn test_seated_patients_leave_the_queue() {
    let harness = Harness::new();
    let chair_id = harness.add_chair().await;
    let seated = harness.check_in(Priority::Urgent).await;
    let waiting = harness.check_in(Priority::Normal).await;

    harness
        .coordinator
        .seat(seated, chair_id, None, Actor::default())
        .await
        .unwrap();

    let projection = harness.coordinator.list_queue(None, None).await;
    assert_eq!(projection.queue.len(), 1);
    assert_eq!(projection.queue[0].appointment_id, waiting);
}

#[tokio::test]
async fn test_list_flow_filters_by_provider_and_chair() {
    let harness = Harness::new();
    let chair_id = harness.add_chair().await;
    let seated = harness.check_in(Priority::Normal).await;
    let queued = harness.check_in(Priority::Normal).await;
    harness
        .coordinator
        .seat(seated, chair_id, None, Actor::default())
        .await
        .unwrap();

    let all = harness.coordinator.list_flow(FlowListFilter::default()).await;
    assert_eq!(all.len(), 2);

    let by_chair = harness
        .coordinator
        .list_flow(FlowListFilter {
            chair_id: Some(chair_id),
            ..Default::default()
        })
        .await;
    assert_eq!(by_chair.len(), 1);
    assert_eq!(by_chair[0].state.appointment_id, seated);
    assert_eq!(by_chair[0].current_wait_minutes, None);

    let queued_view = all
        .iter()
        .find(|view| view.state.appointment_id == queued)
        .unwrap();
    let provider_id = queued_view.state.provider_id;
    let by_provider = harness
        .coordinator
        .list_flow(FlowListFilter {
            provider_id: Some(provider_id),
            stage: Some(FlowStage::CheckedIn),
            ..Default::default()
        })
        .await;
    assert_eq!(by_provider.len(), 1);
    assert_eq!(by_provider[0].state.appointment_id, queued);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Ordering must be deterministic and totally consistent with
    // (priority desc, checked_in_at asc, id) regardless of insertion order.
    #[test]
    fn prop_queue_order_is_deterministic(
        offsets in proptest::collection::vec((0u8..4, 0i64..180), 1..12)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let harness = Harness::new();
            for (tier, minutes) in &offsets {
                let priority = match tier {
                    0 => Priority::Low,
                    1 => Priority::Normal,
                    2 => Priority::High,
                    _ => Priority::Urgent,
                };
                // Stagger check-in times without moving the day.
                harness.clock.set(common::start_of_day() + Duration::minutes(*minutes));
                harness.check_in(priority).await;
            }
            harness.clock.set(common::start_of_day() + Duration::minutes(240));

            let first = harness.coordinator.list_queue(None, None).await;
            let second = harness.coordinator.list_queue(None, None).await;
            let ids = |projection: &chairflow::QueueProjection| {
                projection
                    .queue
                    .iter()
                    .map(|entry| entry.flow_state_id)
                    .collect::<Vec<_>>()
            };
            assert_eq!(ids(&first), ids(&second));

            for pair in first.queue.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                assert!(a.priority >= b.priority);
                if a.priority == b.priority {
                    assert!(a.checked_in_at <= b.checked_in_at);
                    if a.checked_in_at == b.checked_in_at {
                        assert!(a.flow_state_id <= b.flow_state_id);
                    }
                }
            }
        });
    }
}
