//! # Mock Framework
//!
//! Utilities for testing session clients in isolation.
//!
//! Use [`create_mock_client`] to get a client, a receiver and a view publisher.
//! Then use helpers like [`expect_event`] or [`expect_shutdown`] to assert behavior.
//! [`MockSession`] offers the same thing with queued expectations.

use crate::framework::{FrameworkError, Response, SessionClient, SessionEntity, SessionRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// An expected request to the mock session.
enum Expectation<T: SessionEntity> {
    Event,
    View {
        response: Result<T::View, FrameworkError>,
    },
    Shutdown {
        response: Result<T::View, FrameworkError>,
    },
}

/// A mock session with expectation tracking for fluent testing.
///
/// # Example
/// ```ignore
/// let mut mock = MockSession::<TrackingSession>::new(TrackingView::default());
/// mock.expect_event();
/// mock.expect_shutdown().return_ok(TrackingView::default());
///
/// let client = TrackingClient::new("order-1", mock.client());
/// // Use client in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockSession<T: SessionEntity> {
    client: SessionClient<T>,
    expectations: Arc<Mutex<VecDeque<Expectation<T>>>>,
    received: Arc<Mutex<Vec<T::Event>>>,
    view_tx: watch::Sender<T::View>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: SessionEntity> MockSession<T> {
    /// Creates a new mock session publishing `initial` as its view.
    pub fn new(initial: T::View) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SessionRequest<T>>(100);
        let (view_tx, view_rx) = watch::channel(initial);
        let expectations = Arc::new(Mutex::new(VecDeque::new()));
        let expectations_clone = expectations.clone();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        // Spawn background task to handle requests
        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let mut exps = expectations_clone.lock().unwrap();
                let expectation = exps.pop_front();
                drop(exps);

                match (request, expectation) {
                    (SessionRequest::Event { event }, Some(Expectation::Event)) => {
                        received_clone.lock().unwrap().push(event);
                    }
                    (SessionRequest::GetView { respond_to }, Some(Expectation::View { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (SessionRequest::Shutdown { respond_to }, Some(Expectation::Shutdown { response })) => {
                        let _ = respond_to.send(response);
                    }
                    _ => {
                        panic!("Unexpected request or expectation mismatch");
                    }
                }
            }
        });

        Self {
            client: SessionClient::new(sender, view_rx),
            expectations,
            received,
            view_tx,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> SessionClient<T> {
        self.client.clone()
    }

    /// Expects an event to be sent. Received events are kept for [`MockSession::take_events`].
    pub fn expect_event(&mut self) {
        self.expectations.lock().unwrap().push_back(Expectation::Event);
    }

    /// Expects a `view` round trip.
    pub fn expect_view(&mut self) -> ViewExpectationBuilder<T> {
        ViewExpectationBuilder {
            shutdown: false,
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `shutdown` request.
    pub fn expect_shutdown(&mut self) -> ViewExpectationBuilder<T> {
        ViewExpectationBuilder {
            shutdown: true,
            expectations: self.expectations.clone(),
        }
    }

    /// Publishes a view to every watcher, as a running session would after an event.
    pub fn publish(&self, view: T::View) {
        self.view_tx.send_replace(view);
    }

    /// Drains the events received so far.
    pub fn take_events(&self) -> Vec<T::Event> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }

    /// Verifies that all expectations were met.
    ///
    /// # Panics
    /// Panics if there are unmet expectations.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Unmet expectations: {} remaining", exps.len());
        }
    }
}

/// Builder for expectations answered with a view.
pub struct ViewExpectationBuilder<T: SessionEntity> {
    shutdown: bool,
    expectations: Arc<Mutex<VecDeque<Expectation<T>>>>,
}

impl<T: SessionEntity> ViewExpectationBuilder<T> {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, view: T::View) {
        self.push(Ok(view));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: FrameworkError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T::View, FrameworkError>) {
        let expectation = if self.shutdown {
            Expectation::Shutdown { response }
        } else {
            Expectation::View { response }
        };
        self.expectations.lock().unwrap().push_back(expectation);
    }
}

// =============================================================================
// RAW CHANNEL HELPERS
// =============================================================================

/// Creates a mock client, the receiver behind it, and the publisher for its view.
///
/// # Testing Strategy
/// When testing a wrapper such as `TrackingClient` there is no need to spin up a real
/// `SessionActor`. The test reads the raw requests off `receiver`, answers them by hand,
/// and drives watchers by publishing views. Timing and failures stay fully deterministic.
pub fn create_mock_client<T: SessionEntity>(
    buffer_size: usize,
    initial: T::View,
) -> (
    SessionClient<T>,
    mpsc::Receiver<SessionRequest<T>>,
    watch::Sender<T::View>,
) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    let (view_tx, view_rx) = watch::channel(initial);
    (SessionClient::new(sender, view_rx), receiver, view_tx)
}

/// Helper to verify that the next message is an Event
pub async fn expect_event<T: SessionEntity>(
    receiver: &mut mpsc::Receiver<SessionRequest<T>>,
) -> Option<T::Event> {
    match receiver.recv().await {
        Some(SessionRequest::Event { event }) => Some(event),
        _ => None,
    }
}

/// Helper to verify that the next message is a GetView request
pub async fn expect_view<T: SessionEntity>(
    receiver: &mut mpsc::Receiver<SessionRequest<T>>,
) -> Option<Response<T::View>> {
    match receiver.recv().await {
        Some(SessionRequest::GetView { respond_to }) => Some(respond_to),
        _ => None,
    }
}

/// Helper to verify that the next message is a Shutdown request
pub async fn expect_shutdown<T: SessionEntity>(
    receiver: &mut mpsc::Receiver<SessionRequest<T>>,
) -> Option<Response<T::View>> {
    match receiver.recv().await {
        Some(SessionRequest::Shutdown { respond_to }) => Some(respond_to),
        _ => None,
    }
}
