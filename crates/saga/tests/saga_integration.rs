//! Integration tests for the trip booking saga.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{BookingId, RunId};
use engine::{ActivityOptions, RetryPolicy, RunStatus, WorkflowError, WorkflowEvent};
use history::{AppendOptions, HistoryRecord, HistoryStore, InMemoryHistoryStore};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use trip_saga::names::{TASK_QUEUE_ACTIVITIES, TASK_QUEUE_WORKFLOWS, WORKFLOW_BOOK_TRIP};
use trip_saga::{
    InMemoryReservationService, TravelAgency, Trip, TripBookingClient, TripBranch, TripError,
    default_activity_options, new_engine,
};

struct TestHarness {
    client: TripBookingClient<InMemoryHistoryStore>,
    store: InMemoryHistoryStore,
    car: InMemoryReservationService,
    hotel: InMemoryReservationService,
    flight: InMemoryReservationService,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_services(
            InMemoryReservationService::car(),
            InMemoryReservationService::hotel(),
            InMemoryReservationService::flight(),
            default_activity_options(),
        )
    }

    fn with_options(options: ActivityOptions) -> Self {
        Self::with_services(
            InMemoryReservationService::car(),
            InMemoryReservationService::hotel(),
            InMemoryReservationService::flight(),
            options,
        )
    }

    fn with_services(
        car: InMemoryReservationService,
        hotel: InMemoryReservationService,
        flight: InMemoryReservationService,
        options: ActivityOptions,
    ) -> Self {
        let store = InMemoryHistoryStore::new();
        let agency = TravelAgency::new(car.clone(), hotel.clone(), flight.clone());
        let engine = new_engine(store.clone(), &agency, options);

        Self {
            client: TripBookingClient::new(Arc::new(engine)),
            store,
            car,
            hotel,
            flight,
        }
    }

    fn services(&self) -> [&InMemoryReservationService; 3] {
        [&self.car, &self.hotel, &self.flight]
    }

    fn cancel_calls(&self) -> usize {
        self.services().iter().map(|s| s.cancelled_ids().len()).sum()
    }

    fn fix_ids(&self) {
        self.car.set_fixed_booking_id("car-booking-id");
        self.hotel.set_fixed_booking_id("hotel-booking-id");
        self.flight.set_fixed_booking_id("flight-booking-id");
    }

    async fn events(&self, run_id: RunId) -> Vec<(String, serde_json::Value)> {
        self.store
            .read_run(run_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.event_type, r.payload))
            .collect()
    }

    async fn append(&self, run_id: RunId, events: &[WorkflowEvent]) {
        let mut version = self
            .store
            .run_version(run_id)
            .await
            .unwrap()
            .unwrap_or_default();
        for event in events {
            let record = HistoryRecord::builder()
                .run_id(run_id)
                .workflow_type(WORKFLOW_BOOK_TRIP)
                .event_type(event.event_type())
                .version(version.next())
                .payload(event)
                .unwrap()
                .build();
            version = self
                .store
                .append(vec![record], AppendOptions::expect_version(version))
                .await
                .unwrap();
        }
    }
}

fn expected_trip() -> Trip {
    Trip {
        car_booking_id: BookingId::new("car-booking-id"),
        hotel_booking_id: BookingId::new("hotel-booking-id"),
        flight_booking_id: BookingId::new("flight-booking-id"),
    }
}

// Scenario A / P1

#[tokio::test(start_paused = true)]
async fn test_all_bookings_succeed_returns_trip() {
    let h = TestHarness::new();
    h.fix_ids();

    let trip = h.client.book_trip("user-id-success-test").await.unwrap();

    assert_eq!(trip, expected_trip());
    assert_eq!(h.cancel_calls(), 0);
    for service in h.services() {
        assert_eq!(service.book_calls(), 1);
        assert_eq!(service.booking_count(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_trip_ids_are_the_returned_ids() {
    let h = TestHarness::new();

    let trip = h.client.book_trip("user-1").await.unwrap();

    assert!(h.car.has_booking(trip.car_booking_id.as_str()));
    assert!(h.hotel.has_booking(trip.hotel_booking_id.as_str()));
    assert!(h.flight.has_booking(trip.flight_booking_id.as_str()));
}

// Scenario B / P2 / P3

#[tokio::test(start_paused = true)]
async fn test_all_bookings_fail_all_compensated() {
    let h = TestHarness::new();
    for service in h.services() {
        service.set_fail_on_book(true);
    }

    let err = h
        .client
        .book_trip("user-id-all-compensated-test")
        .await
        .unwrap_err();

    assert!(matches!(err, TripError::BookingsFailedAllCompensated { .. }));
    assert_eq!(err.to_string(), "Failed to complete bookings. All bookings canceled.");
    assert_eq!(err.failed_bookings().len(), 3);
    for service in h.services() {
        assert_eq!(service.cancelled_ids(), vec![BookingId::none()]);
    }
}

// Scenario C / P4

#[tokio::test(start_paused = true)]
async fn test_cancellation_failure_is_compensation_failed() {
    let h = TestHarness::new();
    for service in h.services() {
        service.set_fail_on_book(true);
    }
    h.hotel.set_fail_on_cancel(true);

    let err = h
        .client
        .book_trip("user-id-all-compensated-test")
        .await
        .unwrap_err();

    assert!(matches!(err, TripError::BookingsFailedCompensationFailed { .. }));
    assert_eq!(err.to_string(), "Failed to complete bookings. Failed to cancel bookings.");
    assert!(err.needs_remediation());
    assert_eq!(err.failed_cancellations().len(), 1);
    assert_eq!(err.failed_cancellations()[0].branch, TripBranch::Hotel);
    // Every cancellation still ran; the hotel one was retried.
    assert_eq!(h.car.cancelled_ids().len(), 1);
    assert_eq!(h.flight.cancelled_ids().len(), 1);
    assert_eq!(h.hotel.cancelled_ids().len(), 3);
}

// Scenario D / P2 / P6

#[tokio::test(start_paused = true)]
async fn test_single_failure_cancels_every_branch() {
    let h = TestHarness::new();
    h.fix_ids();
    h.flight.set_fail_on_book(true);

    let err = h.client.book_trip("user-1").await.unwrap_err();

    assert!(err.is_terminal());
    assert_eq!(err.kind(), TripError::ALL_COMPENSATED);
    assert_eq!(err.failed_bookings().len(), 1);
    assert_eq!(err.failed_bookings()[0].branch, TripBranch::Flight);

    assert_eq!(h.car.cancelled_ids(), vec![BookingId::new("car-booking-id")]);
    assert_eq!(h.hotel.cancelled_ids(), vec![BookingId::new("hotel-booking-id")]);
    assert_eq!(h.flight.cancelled_ids(), vec![BookingId::none()]);
    assert_eq!(h.car.booking_count(), 0);
    assert_eq!(h.hotel.booking_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_every_failure_combination_compensates_all_three() {
    for mask in 1u8..8 {
        let h = TestHarness::new();
        for (i, service) in h.services().iter().enumerate() {
            service.set_fail_on_book(mask & (1 << i) != 0);
        }

        let err = h.client.book_trip("user-1").await.unwrap_err();

        assert_eq!(err.kind(), TripError::ALL_COMPENSATED, "mask {mask:03b}");
        assert_eq!(err.failed_bookings().len(), mask.count_ones() as usize);
        for service in h.services() {
            assert_eq!(service.cancelled_ids().len(), 1, "mask {mask:03b}");
            assert_eq!(service.booking_count(), 0, "mask {mask:03b}");
        }
    }
}

// P5

#[tokio::test(start_paused = true)]
async fn test_fan_in_waits_for_slower_branches_after_early_failure() {
    let h = TestHarness::with_services(
        InMemoryReservationService::car(),
        InMemoryReservationService::hotel().with_latency(Duration::from_millis(200)),
        InMemoryReservationService::flight().with_latency(Duration::from_millis(500)),
        default_activity_options().with_retry_policy(RetryPolicy::no_retries()),
    );
    h.car.set_fail_on_book(true);

    let run_id = h.client.start("user-1").await.unwrap();
    let err = h.client.result(run_id).await.unwrap_err();
    assert_eq!(err.kind(), TripError::ALL_COMPENSATED);

    // The slow bookings finished and their real ids were cancelled.
    let hotel_id = h.hotel.cancelled_ids()[0].clone();
    let flight_id = h.flight.cancelled_ids()[0].clone();
    assert!(!hotel_id.is_empty());
    assert!(!flight_id.is_empty());
    assert!(h.car.cancelled_ids()[0].is_empty());

    // The failing branch finished first, and no cancellation was scheduled
    // before all three booking outcomes were recorded.
    let events = h.events(run_id).await;
    let is_outcome = |t: &str| t == "ActivityCompleted" || t == "ActivityFailed";
    let first_outcome = events.iter().find(|(t, _)| is_outcome(t)).unwrap();
    assert_eq!(first_outcome.0, "ActivityFailed");
    assert_eq!(first_outcome.1["data"]["seq"], 1);

    let first_cancel = events
        .iter()
        .position(|(t, p)| {
            t == "ActivityScheduled"
                && p["data"]["activity_type"]
                    .as_str()
                    .is_some_and(|name| name.starts_with("cancel-"))
        })
        .unwrap();
    let outcomes_before_cancel = events[..first_cancel]
        .iter()
        .filter(|(t, _)| is_outcome(t))
        .count();
    assert_eq!(outcomes_before_cancel, 3);
}

// Invocation policy

#[tokio::test(start_paused = true)]
async fn test_transient_booking_failures_are_retried() {
    let h = TestHarness::new();
    h.car.fail_next_books(2);

    let trip = h.client.book_trip("user-1").await.unwrap();

    assert!(h.car.has_booking(trip.car_booking_id.as_str()));
    assert_eq!(h.car.book_calls(), 3);
    assert_eq!(h.cancel_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_booking_fails_after_three_attempts() {
    let h = TestHarness::new();
    h.hotel.fail_next_books(3);

    let err = h.client.book_trip("user-1").await.unwrap_err();

    assert_eq!(err.kind(), TripError::ALL_COMPENSATED);
    assert_eq!(h.hotel.book_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_service_times_out_and_cannot_be_cancelled() {
    let h = TestHarness::with_services(
        InMemoryReservationService::car().with_latency(Duration::from_secs(5)),
        InMemoryReservationService::hotel(),
        InMemoryReservationService::flight(),
        default_activity_options(),
    );

    let err = h.client.book_trip("user-1").await.unwrap_err();

    assert_eq!(err.kind(), TripError::COMPENSATION_FAILED);
    assert_eq!(err.failed_bookings()[0].branch, TripBranch::Car);
    assert!(err.failed_bookings()[0].reason.contains("timed out"));
    assert_eq!(err.failed_cancellations()[0].branch, TripBranch::Car);
    assert_eq!(h.hotel.booking_count(), 0);
    assert_eq!(h.flight.booking_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout_and_attempts() {
    let options = ActivityOptions::new(TASK_QUEUE_ACTIVITIES)
        .with_start_to_close_timeout(Duration::from_secs(10))
        .with_retry_policy(RetryPolicy::default().with_maximum_attempts(5));
    let h = TestHarness::with_services(
        InMemoryReservationService::car().with_latency(Duration::from_secs(5)),
        InMemoryReservationService::hotel(),
        InMemoryReservationService::flight(),
        options,
    );
    h.flight.fail_next_books(4);

    let trip = h.client.book_trip("user-1").await.unwrap();

    assert!(h.car.has_booking(trip.car_booking_id.as_str()));
    assert_eq!(h.flight.book_calls(), 5);
}

// Entry point

#[tokio::test]
async fn test_blank_user_is_rejected_before_start() {
    let h = TestHarness::new();

    let err = h.client.book_trip("   ").await.unwrap_err();

    assert!(matches!(err, TripError::InvalidUserId(_)));
    assert_eq!(h.store.record_count().await, 0);
    for service in h.services() {
        assert!(service.calls().is_empty());
    }
}

#[tokio::test]
async fn test_blank_user_started_on_engine_is_recorded_as_invalid() {
    let h = TestHarness::new();

    let run_id = h
        .client
        .engine()
        .start_workflow(WORKFLOW_BOOK_TRIP, "  ")
        .await
        .unwrap();
    let err = h.client.result(run_id).await.unwrap_err();

    assert!(matches!(err, TripError::InvalidUserId(ref input) if input == "  "));
    let run = h.client.engine().get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status(), RunStatus::Failed);
    for service in h.services() {
        assert!(service.calls().is_empty());
    }

    // The recorded outcome converts the same way on a later read.
    let again = h.client.result(run_id).await.unwrap_err();
    assert_eq!(again.kind(), TripError::INVALID_USER_ID);
}

// Durability

#[tokio::test(start_paused = true)]
async fn test_finished_run_replays_without_new_calls() {
    let h = TestHarness::new();
    h.fix_ids();

    let run_id = h.client.start("user-1").await.unwrap();
    let first = h.client.result(run_id).await.unwrap();
    let records = h.store.record_count().await;

    let second = h.client.result(run_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.record_count().await, records);
    for service in h.services() {
        assert_eq!(service.book_calls(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_keeps_its_classification() {
    let h = TestHarness::new();
    h.car.set_fail_on_book(true);
    h.car.set_fail_on_cancel(true);

    let run_id = h.client.start("user-1").await.unwrap();
    let first = h.client.result(run_id).await.unwrap_err();
    let second = h.client.result(run_id).await.unwrap_err();

    assert_eq!(first.kind(), TripError::COMPENSATION_FAILED);
    assert_eq!(second.kind(), TripError::COMPENSATION_FAILED);
    assert_eq!(second.failed_cancellations(), first.failed_cancellations());
    assert_eq!(h.car.cancelled_ids().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_recover_resumes_interrupted_run() {
    let h = TestHarness::new();
    let run_id = RunId::new();
    let user = serde_json::json!(["user-1"]);

    // Crashed after car completed and while hotel was in flight.
    h.append(
        run_id,
        &[
            WorkflowEvent::workflow_started(
                WORKFLOW_BOOK_TRIP,
                TASK_QUEUE_WORKFLOWS,
                serde_json::json!("user-1"),
            ),
            WorkflowEvent::activity_scheduled(1, "book-car", TASK_QUEUE_ACTIVITIES, user.clone()),
            WorkflowEvent::activity_scheduled(2, "book-hotel", TASK_QUEUE_ACTIVITIES, user),
            WorkflowEvent::activity_completed(1, serde_json::json!("car-from-before-crash"), 1),
        ],
    )
    .await;

    let resumed = h.client.engine().recover().await.unwrap();
    assert_eq!(resumed, vec![run_id]);

    assert_eq!(h.car.book_calls(), 0);
    assert_eq!(h.hotel.book_calls(), 1);
    assert_eq!(h.flight.book_calls(), 1);

    let trip = h.client.result(run_id).await.unwrap();
    assert_eq!(trip.car_booking_id.as_str(), "car-from-before-crash");

    let run = h.client.engine().get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status(), RunStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_resume_during_compensation_does_not_rebook() {
    let h = TestHarness::new();
    let run_id = RunId::new();
    let user = serde_json::json!(["user-1"]);
    let failure = engine::ActivityFailure {
        activity_type: "book-flight".to_string(),
        attempts: 3,
        reason: "no seats".to_string(),
    };

    h.append(
        run_id,
        &[
            WorkflowEvent::workflow_started(
                WORKFLOW_BOOK_TRIP,
                TASK_QUEUE_WORKFLOWS,
                serde_json::json!("user-1"),
            ),
            WorkflowEvent::activity_scheduled(1, "book-car", TASK_QUEUE_ACTIVITIES, user.clone()),
            WorkflowEvent::activity_scheduled(2, "book-hotel", TASK_QUEUE_ACTIVITIES, user.clone()),
            WorkflowEvent::activity_scheduled(3, "book-flight", TASK_QUEUE_ACTIVITIES, user),
            WorkflowEvent::activity_completed(1, serde_json::json!("car-1"), 1),
            WorkflowEvent::activity_completed(2, serde_json::json!("hotel-1"), 1),
            WorkflowEvent::activity_failed(3, failure),
            WorkflowEvent::activity_scheduled(
                4,
                "cancel-car-booking",
                TASK_QUEUE_ACTIVITIES,
                serde_json::json!(["user-1", "car-1"]),
            ),
            WorkflowEvent::activity_completed(4, serde_json::Value::Null, 1),
        ],
    )
    .await;

    let err = h.client.result(run_id).await.unwrap_err();

    assert_eq!(err.kind(), TripError::ALL_COMPENSATED);
    for service in h.services() {
        assert_eq!(service.book_calls(), 0);
    }
    assert!(h.car.cancelled_ids().is_empty());
    assert_eq!(h.hotel.cancelled_ids(), vec![BookingId::new("hotel-1")]);
    assert_eq!(h.flight.cancelled_ids(), vec![BookingId::none()]);
}

/// Collects the message of every event logged while installed.
#[derive(Clone, Default)]
struct MessageLog(Arc<Mutex<Vec<String>>>);

impl MessageLog {
    fn count(&self, message: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|m| *m == message).count()
    }
}

impl<S: tracing::Subscriber> Layer<S> for MessageLog {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Message(Option<String>);
        impl Visit for Message {
            fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}"));
                }
            }
        }
        let mut message = Message(None);
        event.record(&mut message);
        if let Some(message) = message.0 {
            self.0.lock().unwrap().push(message);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_resumed_compensation_logs_decisions_once() {
    let log = MessageLog::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

    let h = TestHarness::new();
    h.car.set_fail_on_book(true);
    let run_id = h.client.start("user-1").await.unwrap();
    h.client.result(run_id).await.unwrap_err();
    assert_eq!(log.count("bookings failed, cancelling all bookings"), 1);
    assert_eq!(log.count("BookTrip workflow failed"), 1);

    // Same run resumed from its history, minus the recorded outcome.
    let resumed = RunId::new();
    let events: Vec<WorkflowEvent> = h
        .store
        .read_run(run_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| serde_json::from_value(r.payload).unwrap())
        .filter(|e| !matches!(e, WorkflowEvent::WorkflowFailed(_)))
        .collect();
    h.append(resumed, &events).await;

    let err = h.client.result(resumed).await.unwrap_err();

    assert_eq!(err.kind(), TripError::ALL_COMPENSATED);
    assert_eq!(log.count("BookTrip workflow started"), 1);
    assert_eq!(log.count("bookings failed, cancelling all bookings"), 1);
    assert_eq!(log.count("BookTrip workflow failed"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_diverging_history_is_reported_not_classified() {
    let h = TestHarness::new();
    let run_id = RunId::new();

    h.append(
        run_id,
        &[
            WorkflowEvent::workflow_started(
                WORKFLOW_BOOK_TRIP,
                TASK_QUEUE_WORKFLOWS,
                serde_json::json!("user-1"),
            ),
            WorkflowEvent::activity_scheduled(
                1,
                "book-hotel",
                TASK_QUEUE_ACTIVITIES,
                serde_json::json!(["user-1"]),
            ),
        ],
    )
    .await;

    let err = h.client.result(run_id).await.unwrap_err();

    assert!(matches!(
        err,
        TripError::Engine(WorkflowError::NonDeterminism(_))
    ));
    assert!(!err.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_trips_are_independent() {
    let h = TestHarness::new();

    let (a, b) = tokio::join!(h.client.book_trip("user-a"), h.client.book_trip("user-b"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.car_booking_id, b.car_booking_id);
    assert_eq!(h.car.booking_count(), 2);
}
