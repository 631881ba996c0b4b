use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;
use crate::config::SessionTimings;
use crate::core::{
    BeamError,
    Credential,
    FilePayload,
    ProgressCallback,
    Result,
    SessionId,
    TransportResponse,
    UploadProgress,
    UploadState,
    UploadTransport,
};
use crate::notify::{NotificationQueue, Severity};
use crate::upload::{
    Outcome,
    UploadError,
    UploadEvent,
    UploadReceipt,
    UploadSession,
    UploadSessionHandle,
    ValidationError,
};

#[derive(Clone)]
enum Behavior {
    Respond(u16, &'static str),
    NetworkFailure,
    /// Responds only after the delay
    Slow(Duration, u16, &'static str),
    /// Reports progress, then never completes
    Hang,
}

/// Plays back one behavior per call (the last one repeats) and counts calls.
struct MockTransport {
    behaviors: Vec<Behavior>,
    calls: AtomicUsize,
}

impl MockTransport {
    fn new(behavior: Behavior) -> Arc<Self> {
        Self::sequence(vec![behavior])
    }

    fn sequence(behaviors: Vec<Behavior>) -> Arc<Self> {
        Arc::new(Self {
            behaviors,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn upload(
        &self,
        file: FilePayload,
        _credential: Credential,
        progress: ProgressCallback,
    ) -> Result<TransportResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behaviors[call.min(self.behaviors.len() - 1)].clone();

        progress(UploadProgress::new(file.size / 2, Some(file.size)));
        progress(UploadProgress::new(file.size, Some(file.size)));

        match behavior {
            Behavior::Respond(status, body) => Ok(TransportResponse::new(status, body)),
            Behavior::NetworkFailure => Err(BeamError::internal("connection reset by peer")),
            Behavior::Slow(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse::new(status, body))
            }
            Behavior::Hang => std::future::pending().await,
        }
    }
}

struct Fixture {
    handle: UploadSessionHandle,
    transport: Arc<MockTransport>,
    notifications: NotificationQueue,
    events: broadcast::Receiver<UploadEvent>,
}

impl Fixture {
    fn new(transport: Arc<MockTransport>) -> Self {
        let notifications = NotificationQueue::new(Duration::from_millis(3000));
        let handle = UploadSession::new(transport.clone(), notifications.clone(), SessionTimings::default());
        let events = handle.session.subscribe_events();

        Self {
            handle,
            transport,
            notifications,
            events,
        }
    }

    fn session(&self) -> &UploadSession {
        &self.handle.session
    }

    async fn next_event(&mut self) -> UploadEvent {
        let event = tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match self.events.recv().await {
                    Ok(event) => return event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("session closed"),
                }
            }
        })
        .await;

        event.expect("timed out waiting for an upload event")
    }

    /// Collects events up to and including the first one matching `done`.
    async fn collect_until(&mut self, done: impl Fn(&UploadEvent) -> bool) -> Vec<UploadEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    }

    fn drain(&mut self) -> Vec<UploadEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }
}

fn report_pdf() -> FilePayload {
    FilePayload::from_bytes("report.pdf", vec![0u8; 1_048_576])
}

fn is_state(event: &UploadEvent, state: UploadState) -> bool {
    matches!(event, UploadEvent::StateChanged { new_state, .. } if *new_state == state)
}

fn assert_elapsed(since: Instant, millis: u64) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= Duration::from_millis(millis) && elapsed < Duration::from_millis(millis + 10),
        "expected ~{}ms, got {:?}",
        millis,
        elapsed
    );
}

fn finished_count(events: &[UploadEvent]) -> usize {
    events.iter().filter(|event| matches!(event, UploadEvent::Finished { .. })).count()
}

#[tokio::test(start_paused = true)]
async fn test_invalid_inputs_never_create_a_transport() {
    let mut fixture = Fixture::new(MockTransport::new(Behavior::Respond(200, r#"{"success":true}"#)));

    let cases: Vec<(Option<FilePayload>, &str, ValidationError)> = vec![
        (None, "secret", ValidationError::MissingFile),
        (Some(report_pdf()), "", ValidationError::MissingCredential),
        (Some(report_pdf()), " \t\n", ValidationError::MissingCredential),
    ];
    let total = cases.len();

    for (file, credential, expected) in cases {
        let session_id = fixture.session().submit(file, credential).await.unwrap();

        let snapshot = fixture.session().snapshot();
        assert_eq!(snapshot.session_id, Some(session_id));
        assert_eq!(snapshot.state, UploadState::Failed);
        assert_eq!(snapshot.outcome, Some(Outcome::Failed(UploadError::Validation(expected))));
        assert!(snapshot.progress.is_none());

        let events = fixture.collect_until(|event| matches!(event, UploadEvent::Finished { .. })).await;
        assert_eq!(
            events[0],
            UploadEvent::StateChanged {
                session_id,
                old_state: UploadState::Idle,
                new_state: UploadState::Failed,
            }
        );
        assert!(!events.iter().any(|event| is_state(event, UploadState::Submitting)));
        assert!(!events.iter().any(|event| is_state(event, UploadState::InFlight)));
    }

    assert_eq!(fixture.transport.calls(), 0);

    let notices = fixture.notifications.active();
    assert_eq!(notices.len(), total);
    assert!(notices.iter().all(|notice| notice.severity == Severity::Error));

    // Nothing was shown, so nothing gets hidden later
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        !fixture
            .drain()
            .iter()
            .any(|event| matches!(event, UploadEvent::ProgressHidden { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_successful_upload_scenario() {
    let mut fixture = Fixture::new(MockTransport::new(Behavior::Respond(
        200,
        r#"{"success": true, "filename": "report.pdf", "md5": "b6d81b360a5672d80c27430f39153e2c", "size": 1048576}"#,
    )));

    let session_id = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    let events = fixture.collect_until(|event| matches!(event, UploadEvent::Finished { .. })).await;
    let finished_at = Instant::now();

    let in_flight = events.iter().position(|e| is_state(e, UploadState::InFlight)).unwrap();
    let succeeded = events.iter().position(|e| is_state(e, UploadState::Succeeded)).unwrap();
    let submitting = events.iter().position(|e| is_state(e, UploadState::Submitting)).unwrap();
    assert!(submitting < in_flight && in_flight < succeeded);

    let progress: Vec<(usize, UploadProgress)> = events
        .iter()
        .enumerate()
        .filter_map(|(index, event)| match event {
            UploadEvent::Progress { progress, .. } => Some((index, *progress)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 2);
    assert!(progress.iter().all(|(index, _)| *index > in_flight && *index < succeeded));
    assert_eq!(progress[1].1.percentage(), Some(100.0));

    match events.last() {
        Some(UploadEvent::Finished { outcome: Outcome::Succeeded(receipt), .. }) => {
            assert_eq!(receipt.filename.as_deref(), Some("report.pdf"));
            assert_eq!(receipt.size, Some(1_048_576));
        }
        other => panic!("expected success, got {:?}", other),
    }

    // Form reset comes right away, the list refresh one second later
    let rest = fixture
        .collect_until(|event| matches!(event, UploadEvent::ListingRefreshDue { .. }))
        .await;
    assert_eq!(rest[0], UploadEvent::FormReset { session_id });
    assert_elapsed(finished_at, 1000);

    let snapshot = fixture.session().snapshot();
    assert_eq!(snapshot.state, UploadState::Succeeded);
    assert!(snapshot.progress.is_none());
    assert!(snapshot.finished_at.is_some());

    let notices = fixture.notifications.active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Success);
    assert_eq!(fixture.transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_file_scenario() {
    let mut fixture = Fixture::new(MockTransport::new(Behavior::Respond(409, "file exists")));

    let session_id = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    let events = fixture.collect_until(|event| matches!(event, UploadEvent::Finished { .. })).await;
    let finished_at = Instant::now();

    assert_eq!(
        events.last(),
        Some(&UploadEvent::Finished {
            session_id,
            outcome: Outcome::Failed(UploadError::DuplicateFile),
        })
    );

    let outcome = fixture.session().snapshot().outcome.unwrap();
    assert!(outcome.message().contains("already exists"));

    let notices = fixture.notifications.active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Error);
    assert_eq!(notices[0].text, outcome.message());

    fixture
        .collect_until(|event| matches!(event, UploadEvent::ProgressHidden { .. }))
        .await;
    assert_elapsed(finished_at, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_transfer() {
    let mut fixture = Fixture::new(MockTransport::new(Behavior::Hang));

    let session_id = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    fixture
        .collect_until(|event| matches!(event, UploadEvent::Progress { .. }))
        .await;
    assert_eq!(fixture.session().snapshot().state, UploadState::InFlight);

    assert!(fixture.session().cancel().await.unwrap());
    let cancelled_at = Instant::now();
    assert!(!fixture.session().cancel().await.unwrap());

    let events = fixture
        .collect_until(|event| matches!(event, UploadEvent::ProgressHidden { .. }))
        .await;
    assert_elapsed(cancelled_at, 3000);

    assert_eq!(finished_count(&events), 1);
    assert!(events.contains(&UploadEvent::Finished {
        session_id,
        outcome: Outcome::Cancelled,
    }));
    assert!(!events.iter().any(|e| is_state(e, UploadState::Succeeded) || is_state(e, UploadState::Failed)));

    // Late progress from the aborted transfer is never surfaced
    let cancelled = events.iter().position(|e| is_state(e, UploadState::Cancelled)).unwrap();
    assert!(!events[cancelled..].iter().any(|e| matches!(e, UploadEvent::Progress { .. })));

    let notices = fixture.notifications.active();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].text, "Upload cancelled");
    assert_eq!(fixture.transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_without_transfer_is_noop() {
    let mut fixture = Fixture::new(MockTransport::new(Behavior::Respond(200, r#"{"success":true}"#)));

    assert!(!fixture.session().cancel().await.unwrap());
    assert_eq!(fixture.session().snapshot().state, UploadState::Idle);

    fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    let settled = fixture.session().settled().await.unwrap();
    assert_eq!(settled.state, UploadState::Succeeded);

    assert!(!fixture.session().cancel().await.unwrap());
    assert_eq!(fixture.session().snapshot().state, UploadState::Succeeded);

    let events = fixture.drain();
    assert_eq!(finished_count(&events), 1);
    assert!(!events.iter().any(|e| is_state(e, UploadState::Cancelled)));
    assert_eq!(fixture.notifications.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_right_after_submit_always_cancels() {
    let fixture = Fixture::new(MockTransport::new(Behavior::Slow(
        Duration::from_millis(500),
        200,
        r#"{"success":true}"#,
    )));

    for _ in 0..200 {
        let session_id = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
        assert!(fixture.session().cancel().await.unwrap());

        let snapshot = fixture.session().settled().await.unwrap();
        assert_eq!(snapshot.session_id, Some(session_id));
        assert_eq!(snapshot.state, UploadState::Cancelled);
        assert_eq!(snapshot.outcome, Some(Outcome::Cancelled));
    }

    assert!(
        fixture
            .notifications
            .active()
            .iter()
            .all(|notice| notice.text == "Upload cancelled")
    );
}

#[tokio::test(start_paused = true)]
async fn test_network_failure() {
    let fixture = Fixture::new(MockTransport::new(Behavior::NetworkFailure));

    fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    let snapshot = fixture.session().settled().await.unwrap();

    match snapshot.outcome {
        Some(Outcome::Failed(UploadError::Network(reason))) => {
            assert!(reason.contains("connection reset"));
        }
        other => panic!("expected network failure, got {:?}", other),
    }
    assert_eq!(fixture.notifications.active()[0].severity, Severity::Error);
}

#[tokio::test(start_paused = true)]
async fn test_every_status_maps_through_the_session() {
    let cases = vec![
        (Behavior::Respond(200, r#"{"success":true}"#), Outcome::Succeeded(UploadReceipt::default())),
        (
            Behavior::Respond(200, r#"{"success":false,"message":"disk full"}"#),
            Outcome::Failed(UploadError::ServerRejected { message: Some("disk full".into()) }),
        ),
        (Behavior::Respond(200, "not json"), Outcome::Failed(UploadError::MalformedResponse)),
        (Behavior::Respond(400, ""), Outcome::Failed(UploadError::BadRequest)),
        (Behavior::Respond(403, ""), Outcome::Failed(UploadError::BadCredential)),
        (Behavior::Respond(409, ""), Outcome::Failed(UploadError::DuplicateFile)),
        (Behavior::Respond(413, ""), Outcome::Failed(UploadError::TooLarge)),
        (Behavior::Respond(502, ""), Outcome::Failed(UploadError::ServerError { status: 502 })),
    ];

    let (behaviors, expected): (Vec<_>, Vec<_>) = cases.into_iter().unzip();
    let fixture = Fixture::new(MockTransport::sequence(behaviors));

    for expected in expected {
        fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
        let snapshot = fixture.session().settled().await.unwrap();
        assert_eq!(snapshot.outcome, Some(expected));
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_is_rejected_while_in_flight() {
    let fixture = Fixture::new(MockTransport::new(Behavior::Hang));

    let first = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    let second = fixture.session().submit(Some(report_pdf()), "secret").await;

    assert!(matches!(second, Err(BeamError::SessionBusy)));
    assert_eq!(fixture.session().snapshot().session_id, Some(first));

    let mut state_rx = fixture.session().watch();
    state_rx
        .wait_for(|snapshot| snapshot.state == UploadState::InFlight)
        .await
        .unwrap();
    assert!(matches!(
        fixture.session().submit(None, "secret").await,
        Err(BeamError::SessionBusy)
    ));
    assert_eq!(fixture.transport.calls(), 1);

    // Once the slot is free a new session may start
    assert!(fixture.session().cancel().await.unwrap());
    let third = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    assert_ne!(third, first);
    assert_eq!(fixture.session().snapshot().session_id, Some(third));
}

#[tokio::test(start_paused = true)]
async fn test_new_session_cancels_stale_timers() {
    let mut fixture = Fixture::new(MockTransport::sequence(vec![
        Behavior::Respond(409, ""),
        Behavior::Hang,
    ]));

    let first = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    fixture.session().settled().await.unwrap();

    let second = fixture.session().submit(Some(report_pdf()), "secret").await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    let hidden: Vec<SessionId> = fixture
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            UploadEvent::ProgressHidden { session_id } => Some(session_id),
            _ => None,
        })
        .collect();
    assert!(!hidden.contains(&first));
    assert!(!hidden.contains(&second));
    assert_eq!(fixture.session().snapshot().state, UploadState::InFlight);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_in_flight_upload() {
    let fixture = Fixture::new(MockTransport::new(Behavior::Hang));
    let session = fixture.session().clone();

    session.submit(Some(report_pdf()), "secret").await.unwrap();
    fixture.handle.shutdown().await.unwrap();

    assert!(matches!(
        session.submit(Some(report_pdf()), "secret").await,
        Err(BeamError::SessionShutdown)
    ));
    assert!(fixture.notifications.is_empty());
}
