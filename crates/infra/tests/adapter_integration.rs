//! End-to-end adapter tests over a scripted partner client.
//!
//! All timing runs on the paused tokio clock; intervals are the stock
//! defaults (3s fast status, 30s full flush, 60s outbox, 300s heartbeat).

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roamsync_core::{AdapterEvent, EventSink};
use roamsync_domain::{
    ChargeRecord, DataPushMode, EvseAvailability, EvseBusyStatus, EvseId, FieldChange, PushStatus,
    StatusUpdate, TransmissionMode,
};
use roamsync_infra::RoamingAdapter;
use support::{CollectingEventSink, MockPartnerClient, PartnerCall};

const FAST: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_secs(30);
const RECORD: Duration = Duration::from_secs(60);
const HEARTBEAT: Duration = Duration::from_secs(300);
const EPSILON: Duration = Duration::from_millis(50);

fn evse(id: &str) -> EvseId {
    EvseId::new(id)
}

fn busy(id: &str, new: EvseBusyStatus) -> StatusUpdate {
    StatusUpdate::busy(evse(id), EvseBusyStatus::Available, new, Utc::now())
}

fn availability(id: &str, new: EvseAvailability) -> StatusUpdate {
    StatusUpdate::availability(evse(id), EvseAvailability::InService, new, Utc::now())
}

fn record(session: &str) -> ChargeRecord {
    ChargeRecord {
        session_id: session.to_owned(),
        evse: evse("DE*TST*E1*1"),
        started_at: Utc::now() - chrono::Duration::hours(1),
        ended_at: Utc::now(),
        energy_wh: 11_000,
        auth_id: None,
    }
}

fn adapter_over(
    client: Arc<MockPartnerClient>,
    events: Arc<dyn EventSink>,
) -> RoamingAdapter {
    let mut adapter = RoamingAdapter::new(support::test_config(), client, events)
        .expect("config is valid");
    adapter.start().expect("adapter starts");
    adapter
}

async fn advance(duration: Duration) {
    // Let freshly spawned tasks register their timers before the clock
    // jumps, otherwise their intervals start from the post-jump instant.
    tokio::task::yield_now().await;
    tokio::time::advance(duration).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn status_burst_coalesces_to_one_call_with_newest_value() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    for status in [EvseBusyStatus::Busy, EvseBusyStatus::Reserved, EvseBusyStatus::Available] {
        let result = adapter
            .enqueue_status(busy("E1", status), true, TransmissionMode::Enqueue)
            .await;
        assert_eq!(result.status, PushStatus::Enqueued);
    }

    advance(FAST + EPSILON).await;

    assert_eq!(
        client.calls(),
        vec![PartnerCall::BusyStatus {
            evse: "E1".into(),
            status: EvseBusyStatus::Available,
        }]
    );
    assert!(adapter.queue_depths().is_empty());
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn data_flush_waits_for_a_full_quiet_interval() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    adapter
        .enqueue_update(evse("E1"), vec![FieldChange::new("power_kw", "22", "43")], TransmissionMode::Enqueue)
        .await;
    advance(Duration::from_secs(10)).await;

    // Second enqueue replaces the deadline; the first one never fires.
    adapter
        .enqueue_update(evse("E1"), vec![FieldChange::new("label", "a", "b")], TransmissionMode::Enqueue)
        .await;
    advance(QUIET - EPSILON).await;
    assert_eq!(client.call_count(), 0);

    advance(EPSILON * 2).await;
    assert_eq!(
        client.calls(),
        vec![PartnerCall::DataPush {
            mode: DataPushMode::Update,
            entities: vec!["E1".into()],
        }]
    );
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn addition_subsumes_update_into_one_create_push() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    adapter.enqueue_addition(evse("E1"), TransmissionMode::Enqueue).await;
    adapter
        .enqueue_update(evse("E1"), vec![FieldChange::new("power_kw", "22", "43")], TransmissionMode::Enqueue)
        .await;

    advance(QUIET + EPSILON).await;

    assert_eq!(
        client.calls(),
        vec![PartnerCall::DataPush {
            mode: DataPushMode::Create,
            entities: vec!["E1".into()],
        }]
    );
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn status_behind_pending_addition_rides_with_the_full_flush() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    adapter.enqueue_addition(evse("E1"), TransmissionMode::Enqueue).await;
    adapter
        .enqueue_status(busy("E1", EvseBusyStatus::Busy), true, TransmissionMode::Enqueue)
        .await;
    adapter
        .enqueue_status(busy("E2", EvseBusyStatus::Busy), true, TransmissionMode::Enqueue)
        .await;

    // Fast cycle transmits only the entity the partner already knows.
    advance(FAST + EPSILON).await;
    assert_eq!(
        client.calls(),
        vec![PartnerCall::BusyStatus {
            evse: "E2".into(),
            status: EvseBusyStatus::Busy,
        }]
    );

    // The full flush creates E1 first, then sends its held-back status.
    advance(QUIET).await;
    let calls = client.calls();
    let create_pos = calls
        .iter()
        .position(|c| matches!(c, PartnerCall::DataPush { mode: DataPushMode::Create, .. }))
        .expect("create push happened");
    let status_pos = calls
        .iter()
        .position(|c| matches!(c, PartnerCall::BusyStatus { evse, .. } if evse == "E1"))
        .expect("held-back status transmitted");
    assert!(create_pos < status_pos);
    assert!(adapter.queue_depths().is_empty());
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn unconvertible_record_never_blocks_its_neighbors() {
    let client = Arc::new(MockPartnerClient::new());
    client.invalidate_item("S-2");
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    for session in ["S-1", "S-2", "S-3"] {
        adapter.submit_charge_record(record(session), TransmissionMode::Enqueue).await;
    }

    advance(RECORD + EPSILON).await;

    let delivered: Vec<_> = client
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PartnerCall::ChargeRecord { session_id } => Some(session_id),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec!["S-1".to_string(), "S-3".to_string()]);

    // The terminal record was dropped, not requeued.
    assert_eq!(adapter.queue_depths().records, 0);
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn direct_mode_bypasses_queues_and_timers() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    let result = adapter
        .enqueue_status(busy("E1", EvseBusyStatus::Busy), true, TransmissionMode::Direct)
        .await;
    assert!(matches!(result.status, PushStatus::Success { .. }));
    assert_eq!(client.call_count(), 1);
    assert!(adapter.queue_depths().is_empty());

    // No timer was armed; nothing further goes out.
    advance(FAST * 4).await;
    assert_eq!(client.call_count(), 1);
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn refused_status_retries_on_the_full_flush_cadence() {
    let client = Arc::new(MockPartnerClient::new());
    client.reject_item("E1");
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    adapter
        .enqueue_status(busy("E1", EvseBusyStatus::Busy), true, TransmissionMode::Enqueue)
        .await;

    advance(FAST + EPSILON).await;
    assert_eq!(client.call_count(), 1);

    // The refused tuple was parked on the delayed list and goes out again
    // with the full flush, not on the fast cadence.
    advance(FAST * 2).await;
    assert_eq!(client.call_count(), 1);

    advance(QUIET).await;
    assert_eq!(client.call_count(), 2);
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn failed_data_push_is_restored_and_redelivered() {
    let client = Arc::new(MockPartnerClient::new());
    client.set_offline(true);
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    adapter.enqueue_addition(evse("E1"), TransmissionMode::Enqueue).await;
    adapter
        .enqueue_status(
            availability("E2", EvseAvailability::OutOfService),
            false,
            TransmissionMode::Enqueue,
        )
        .await;

    // The partner is unreachable: the cycle fails, nothing is recorded on the
    // wire, and both items return to the live queue.
    advance(QUIET + EPSILON).await;
    assert_eq!(client.call_count(), 0);
    let depths = adapter.queue_depths();
    assert_eq!(depths.additions, 1);
    assert_eq!(depths.delayed_status, 1);

    // The failed cycle re-armed the flush; once the partner is back the next
    // cycle delivers exactly one create push and the parked status.
    client.set_offline(false);
    advance(QUIET + EPSILON).await;

    let calls = client.calls();
    assert_eq!(
        calls,
        vec![
            PartnerCall::DataPush {
                mode: DataPushMode::Create,
                entities: vec!["E1".into()],
            },
            PartnerCall::AvailabilityStatus {
                evse: "E2".into(),
                status: EvseAvailability::OutOfService,
            },
        ]
    );
    assert!(adapter.queue_depths().is_empty());
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn disabled_family_short_circuits_before_the_queue() {
    let client = Arc::new(MockPartnerClient::new());
    let mut config = support::test_config();
    config.sync.data_push_enabled = false;
    let mut adapter = RoamingAdapter::new(config, client.clone(), Arc::new(CollectingEventSink::new()))
        .expect("config is valid");
    adapter.start().expect("adapter starts");

    let result = adapter.enqueue_addition(evse("E1"), TransmissionMode::Enqueue).await;
    assert_eq!(result.status, PushStatus::AdminDown);
    assert!(adapter.queue_depths().is_empty());

    advance(QUIET * 2).await;
    assert_eq!(client.call_count(), 0);
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn heartbeat_reaches_the_partner_on_schedule() {
    let client = Arc::new(MockPartnerClient::new());
    let mut adapter = adapter_over(client.clone(), Arc::new(CollectingEventSink::new()));

    advance(HEARTBEAT + EPSILON).await;

    assert_eq!(
        client.calls(),
        vec![PartnerCall::Heartbeat {
            partner_id: "CPO-TEST".into(),
        }]
    );
    assert_eq!(adapter.heartbeat_runs(), 1);
    adapter.stop().await.expect("adapter stops");
}

#[tokio::test(start_paused = true)]
async fn flush_cycles_emit_started_and_finished_events() {
    let client = Arc::new(MockPartnerClient::new());
    let events = Arc::new(CollectingEventSink::new());
    let mut adapter = adapter_over(client.clone(), events.clone());

    adapter.enqueue_addition(evse("E1"), TransmissionMode::Enqueue).await;
    advance(QUIET + EPSILON).await;

    let emitted = events.events();
    assert!(emitted
        .iter()
        .any(|e| matches!(e, AdapterEvent::ChangeEnqueued { .. })));
    assert!(emitted
        .iter()
        .any(|e| matches!(e, AdapterEvent::FlushStarted { .. })));
    assert!(emitted.iter().any(|e| matches!(
        e,
        AdapterEvent::FlushFinished { result, .. } if matches!(result.status, PushStatus::Success { .. })
    )));
    adapter.stop().await.expect("adapter stops");
}
