//! # Mock Transports
//!
//! Test doubles for the order service, following the same expectation-queue style as
//! [`crate::framework::mock`].
//!
//! - [`MockOrderApi`]: queue answers with `expect_fetch()` / `expect_completion()`, then
//!   `verify()`. An answer can be held back with a gate to control arrival order.
//! - [`MockPushChannel`]: the test holds the server end of every subscription and pushes
//!   snapshots, failures and closes by hand.

use crate::clients::{
    ApiError, ChannelError, CompletionResponse, OrderApi, PushChannel, PushMessage, Subscription,
};
use crate::model::{OrderId, OrderSnapshot};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

// =============================================================================
// ORDER API
// =============================================================================

struct Expectation<T> {
    response: Result<T, ApiError>,
    gate: Option<oneshot::Receiver<()>>,
}

type Queue<T> = Arc<Mutex<VecDeque<Expectation<T>>>>;

/// A mock [`OrderApi`] answering from queued expectations.
///
/// # Example
/// ```ignore
/// let api = MockOrderApi::new();
/// api.expect_fetch().return_ok(snapshot);
/// api.expect_completion().return_err(ApiError::Timeout);
///
/// // hand Arc::new(api.clone()) to the system under test...
/// api.verify(); // Ensures all expectations were met
/// ```
#[derive(Clone, Default)]
pub struct MockOrderApi {
    fetches: Queue<OrderSnapshot>,
    completions: Queue<CompletionResponse>,
    fetch_calls: Arc<AtomicUsize>,
    completion_calls: Arc<AtomicUsize>,
    unexpected: Arc<AtomicUsize>,
}

impl MockOrderApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a `fetch_order` call.
    pub fn expect_fetch(&self) -> ExpectationBuilder<OrderSnapshot> {
        ExpectationBuilder {
            queue: self.fetches.clone(),
            gate: None,
        }
    }

    /// Expects a `request_completion` call.
    pub fn expect_completion(&self) -> ExpectationBuilder<CompletionResponse> {
        ExpectationBuilder {
            queue: self.completions.clone(),
            gate: None,
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    /// Verifies that all expectations were met and nothing unexpected was called.
    ///
    /// # Panics
    /// Panics if there are unmet expectations or unexpected calls.
    pub fn verify(&self) {
        let fetches = self.fetches.lock().unwrap().len();
        let completions = self.completions.lock().unwrap().len();
        if fetches + completions > 0 {
            panic!(
                "Unmet expectations: {} fetch, {} completion remaining",
                fetches, completions
            );
        }
        let unexpected = self.unexpected.load(Ordering::SeqCst);
        if unexpected > 0 {
            panic!("{} unexpected calls", unexpected);
        }
    }

    async fn answer<T>(&self, queue: &Queue<T>, what: &str) -> Result<T, ApiError> {
        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(Expectation { response, gate }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                response
            }
            None => {
                self.unexpected.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Transport(format!("unexpected {what} call")))
            }
        }
    }
}

#[async_trait]
impl OrderApi for MockOrderApi {
    async fn fetch_order(&self, _order_id: &OrderId) -> Result<OrderSnapshot, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.fetches, "fetch_order").await
    }

    async fn request_completion(
        &self,
        _order_id: &OrderId,
    ) -> Result<CompletionResponse, ApiError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.completions, "request_completion").await
    }
}

/// Builder for one queued answer.
pub struct ExpectationBuilder<T> {
    queue: Queue<T>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> ExpectationBuilder<T> {
    /// Holds the answer back until the returned sender fires (or is dropped).
    pub fn gated(mut self) -> (Self, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        self.gate = Some(gate);
        (self, release)
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: T) {
        self.push(Ok(value));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: ApiError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T, ApiError>) {
        self.queue.lock().unwrap().push_back(Expectation {
            response,
            gate: self.gate,
        });
    }
}

// =============================================================================
// PUSH CHANNEL
// =============================================================================

struct Feed {
    sender: mpsc::Sender<PushMessage>,
    cancelled: oneshot::Receiver<()>,
    unsubscribed: bool,
}

#[derive(Default)]
struct PushState {
    feeds: HashMap<OrderId, Feed>,
    refusals: VecDeque<ChannelError>,
    subscribe_calls: usize,
}

/// A mock [`PushChannel`] whose server side is driven by the test.
#[derive(Clone, Default)]
pub struct MockPushChannel {
    state: Arc<Mutex<PushState>>,
}

impl MockPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `subscribe` fail with `error`.
    pub fn refuse_next(&self, error: ChannelError) {
        self.state.lock().unwrap().refusals.push_back(error);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().unwrap().subscribe_calls
    }

    /// Whether `order_id` has a subscription that has not been released.
    pub fn is_subscribed(&self, order_id: &OrderId) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.feeds.get_mut(order_id) {
            Some(feed) => {
                let released = !matches!(
                    feed.cancelled.try_recv(),
                    Err(oneshot::error::TryRecvError::Empty)
                );
                if released {
                    feed.unsubscribed = true;
                }
                !feed.unsubscribed
            }
            None => false,
        }
    }

    /// Sends a snapshot to the subscriber of `snapshot.id`. Returns `false` if nobody listens.
    pub fn push(&self, snapshot: OrderSnapshot) -> bool {
        let id = snapshot.id.clone();
        self.send(&id, PushMessage::Snapshot(snapshot))
    }

    /// Breaks the connection for `order_id`.
    pub fn fail(&self, order_id: &OrderId, error: ChannelError) -> bool {
        self.send(order_id, PushMessage::Error(error))
    }

    /// Closes the stream for `order_id` from the server side.
    pub fn close(&self, order_id: &OrderId) -> bool {
        self.send(order_id, PushMessage::Closed)
    }

    fn send(&self, order_id: &OrderId, message: PushMessage) -> bool {
        let state = self.state.lock().unwrap();
        state
            .feeds
            .get(order_id)
            .is_some_and(|feed| feed.sender.try_send(message).is_ok())
    }
}

#[async_trait]
impl PushChannel for MockPushChannel {
    async fn subscribe(&self, order_id: &OrderId) -> Result<Subscription, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.subscribe_calls += 1;
        if let Some(error) = state.refusals.pop_front() {
            return Err(error);
        }

        let (sender, messages) = mpsc::channel(32);
        let (cancel, cancelled) = oneshot::channel();
        state.feeds.insert(
            order_id.clone(),
            Feed {
                sender,
                cancelled,
                unsubscribed: false,
            },
        );
        Ok(Subscription::new(order_id.clone(), messages, cancel))
    }
}
