//! # Core Session Framework
//!
//! This module defines the generic building blocks for session actors.
//!
//! ## Key Types
//!
//! - [`SessionEntity`]: The trait every session state machine implements.
//! - [`CommandHandler`]: Turns entity commands into background [`Task`]s.
//! - [`SessionActor`]: The generic actor that owns one entity and its event queue.
//! - [`SessionClient`]: The generic client for communicating with a running session.
//! - [`Mailbox`]: The handle background work uses to post results back to the session.
//! - [`FrameworkError`]: Common errors (e.g., ActorClosed).

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

// =============================================================================
// 1. THE ABSTRACTION (State Machine, Commands, Tasks)
// =============================================================================

/// Trait that any session state machine must implement to be driven by [`SessionActor`].
///
/// # Architecture Note
/// The entity never performs I/O itself. Every hook is synchronous and returns a list of
/// commands describing the side effects it wants. The injected `Context` turns those commands
/// into background [`Task`]s whose results come back later as ordinary events.
///
/// This keeps all state mutation on one logical queue: the actor calls exactly one hook at a
/// time, so the entity needs no locks, and the whole merge logic can be tested by feeding
/// events directly without spawning anything.
pub trait SessionEntity: Sized + Send + 'static {
    /// Identifier used in logs (e.g., the order id being tracked).
    type Id: Display + Debug;

    /// Everything that can happen to the session (fetch results, pushes, ticks, ...).
    type Event: Send + Debug + 'static;

    /// Side effects requested by the state machine.
    type Command: Send + Debug + 'static;

    /// Read model published to observers after every event.
    type View: Clone + PartialEq + Send + Sync + Debug + 'static;

    /// The runtime context (dependencies) injected into the actor.
    type Context: CommandHandler<Self>;

    /// Identifier of this session.
    fn id(&self) -> &Self::Id;

    /// Called once when the actor starts, before any event is processed.
    fn on_start(&mut self) -> Vec<Self::Command> {
        Vec::new()
    }

    /// Apply one event and return the commands it triggers.
    fn handle_event(&mut self, event: Self::Event) -> Vec<Self::Command>;

    /// Called once during teardown. Any feeds still running are cancelled afterwards.
    fn on_stop(&mut self) -> Vec<Self::Command> {
        Vec::new()
    }

    /// Snapshot of the current read model.
    fn view(&self) -> Self::View;
}

/// Converts entity commands into runnable background work.
pub trait CommandHandler<T: SessionEntity>: Send + Sync + 'static {
    fn dispatch(&self, command: T::Command) -> Task<T>;
}

/// Boxed body of a long-running feed.
pub type FeedFn<T> = Box<dyn FnOnce(Mailbox<T>) -> BoxFuture<'static, ()> + Send>;

/// Background work produced by a [`CommandHandler`].
pub enum Task<T: SessionEntity> {
    /// One-shot call; its output is posted back to the session as an event.
    Call(BoxFuture<'static, T::Event>),
    /// Long-running producer keyed by name. Starting a feed under an existing key replaces it.
    Feed { key: &'static str, run: FeedFn<T> },
    /// Stop the feed registered under `key`. Unknown keys are ignored.
    Cancel(&'static str),
}

impl<T: SessionEntity> Task<T> {
    pub fn call<F>(future: F) -> Self
    where
        F: Future<Output = T::Event> + Send + 'static,
    {
        Task::Call(Box::pin(future))
    }

    pub fn feed<F, Fut>(key: &'static str, run: F) -> Self
    where
        F: FnOnce(Mailbox<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Task::Feed {
            key,
            run: Box::new(move |mailbox| Box::pin(run(mailbox))),
        }
    }
}

// =============================================================================
// 2. THE GENERIC MESSAGES & ERRORS
// =============================================================================

/// Errors that can occur within the session framework itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FrameworkError {
    #[error("Session closed")]
    ActorClosed,
    #[error("Session dropped response channel")]
    ActorDropped,
}

/// Type alias for the one-shot response channel used by sessions.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Internal message type sent to the session actor.
#[derive(Debug)]
pub enum SessionRequest<T: SessionEntity> {
    Event { event: T::Event },
    GetView { respond_to: Response<T::View> },
    Shutdown { respond_to: Response<T::View> },
}

/// Weak sending half handed to background tasks.
///
/// A mailbox never keeps a session alive. Once the session has been torn down every
/// [`Mailbox::post`] returns `false` and the event is discarded, so late results from calls
/// that were in flight during teardown cannot touch a destroyed session.
pub struct Mailbox<T: SessionEntity> {
    sender: mpsc::WeakSender<SessionRequest<T>>,
}

impl<T: SessionEntity> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: SessionEntity> Mailbox<T> {
    /// Posts an event. Returns `false` if the session no longer accepts events.
    pub async fn post(&self, event: T::Event) -> bool {
        match self.sender.upgrade() {
            Some(sender) => sender.send(SessionRequest::Event { event }).await.is_ok(),
            None => false,
        }
    }
}

// =============================================================================
// 3. THE GENERIC SESSION ACTOR
// =============================================================================

/// The generic actor that owns exactly one session entity.
///
/// # Architecture Note
/// This struct is the "Server" half of a session. It owns the entity, the receiver end of
/// the request channel, and every background task the entity asked for.
///
/// **Concurrency Model**:
/// Events from every source (call results, feeds, clients) arrive on one channel and are
/// applied one at a time, so the entity is a plain value with no locking.
///
/// **Teardown**:
/// The loop ends on an explicit `Shutdown` request or when every [`SessionClient`] has been
/// dropped. Either way `on_stop` runs, every feed is aborted, and in-flight calls are aborted.
pub struct SessionActor<T: SessionEntity> {
    entity: T,
    receiver: mpsc::Receiver<SessionRequest<T>>,
    mailbox: Mailbox<T>,
    view_tx: watch::Sender<T::View>,
    feeds: HashMap<&'static str, JoinHandle<()>>,
    calls: Vec<JoinHandle<()>>,
}

impl<T: SessionEntity> SessionActor<T> {
    pub fn new(entity: T, buffer_size: usize) -> (Self, SessionClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (view_tx, view_rx) = watch::channel(entity.view());
        let actor = Self {
            entity,
            receiver,
            mailbox: Mailbox {
                sender: sender.downgrade(),
            },
            view_tx,
            feeds: HashMap::new(),
            calls: Vec::new(),
        };
        let client = SessionClient::new(sender, view_rx);
        (actor, client)
    }

    /// Runs the session's event loop until shutdown.
    ///
    /// # Context Injection
    /// The `context` turns commands into tasks. It is supplied here rather than in `new()` so
    /// callers can build the actor first and wire its collaborators afterwards.
    pub async fn run(mut self, context: T::Context) {
        let session = self.entity.id().to_string();
        info!(%session, "Session started");

        let commands = self.entity.on_start();
        self.execute(commands, &context);
        self.publish();

        let mut shutdown_ack = None;
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                SessionRequest::Event { event } => {
                    debug!(%session, ?event, "Event");
                    let commands = self.entity.handle_event(event);
                    self.execute(commands, &context);
                    self.publish();
                }
                SessionRequest::GetView { respond_to } => {
                    let _ = respond_to.send(Ok(self.entity.view()));
                }
                SessionRequest::Shutdown { respond_to } => {
                    shutdown_ack = Some(respond_to);
                    break;
                }
            }
        }

        let commands = self.entity.on_stop();
        self.execute(commands, &context);
        for (key, handle) in self.feeds.drain() {
            debug!(%session, key, "Cancelling feed");
            handle.abort();
        }
        for handle in self.calls.drain(..) {
            handle.abort();
        }
        self.receiver.close();
        self.publish();

        info!(%session, "Session stopped");
        if let Some(respond_to) = shutdown_ack {
            let _ = respond_to.send(Ok(self.entity.view()));
        }
    }

    fn execute(&mut self, commands: Vec<T::Command>, context: &T::Context) {
        self.calls.retain(|handle| !handle.is_finished());

        for command in commands {
            debug!(?command, "Command");
            match context.dispatch(command) {
                Task::Call(future) => {
                    let mailbox = self.mailbox.clone();
                    self.calls.push(tokio::spawn(async move {
                        let event = future.await;
                        if !mailbox.post(event).await {
                            debug!("Session gone, dropping call result");
                        }
                    }));
                }
                Task::Feed { key, run } => {
                    if let Some(previous) = self.feeds.remove(key) {
                        previous.abort();
                    }
                    let handle = tokio::spawn(run(self.mailbox.clone()));
                    self.feeds.insert(key, handle);
                }
                Task::Cancel(key) => {
                    if let Some(handle) = self.feeds.remove(key) {
                        debug!(key, "Cancelling feed");
                        handle.abort();
                    }
                }
            }
        }
    }

    fn publish(&self) {
        let next = self.entity.view();
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

// =============================================================================
// 4. THE GENERIC CLIENT
// =============================================================================

/// A type-safe client for interacting with a [`SessionActor`].
///
/// Cheap to clone. The session stays alive while at least one client exists or until
/// [`SessionClient::shutdown`] is called.
pub struct SessionClient<T: SessionEntity> {
    sender: mpsc::Sender<SessionRequest<T>>,
    view: watch::Receiver<T::View>,
}

impl<T: SessionEntity> Clone for SessionClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            view: self.view.clone(),
        }
    }
}

impl<T: SessionEntity> SessionClient<T> {
    pub fn new(sender: mpsc::Sender<SessionRequest<T>>, view: watch::Receiver<T::View>) -> Self {
        Self { sender, view }
    }

    pub async fn send(&self, event: T::Event) -> Result<(), FrameworkError> {
        self.sender
            .send(SessionRequest::Event { event })
            .await
            .map_err(|_| FrameworkError::ActorClosed)
    }

    pub async fn view(&self) -> Result<T::View, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(SessionRequest::GetView { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    /// Last published view, without a round trip to the actor.
    pub fn latest(&self) -> T::View {
        self.view.borrow().clone()
    }

    /// Receiver notified every time the published view changes.
    pub fn watch(&self) -> watch::Receiver<T::View> {
        self.view.clone()
    }

    /// Tears the session down and returns its final view.
    pub async fn shutdown(&self) -> Result<T::View, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(SessionRequest::Shutdown { respond_to })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// A handle that can reach the session without keeping it alive.
    pub fn downgrade(&self) -> WeakSessionClient<T> {
        WeakSessionClient {
            sender: self.sender.downgrade(),
            view: self.view.clone(),
        }
    }
}

/// Non-owning counterpart of [`SessionClient`].
///
/// Once every [`SessionClient`] is gone the session tears itself down and
/// [`WeakSessionClient::upgrade`] returns `None`.
pub struct WeakSessionClient<T: SessionEntity> {
    sender: mpsc::WeakSender<SessionRequest<T>>,
    view: watch::Receiver<T::View>,
}

impl<T: SessionEntity> Clone for WeakSessionClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            view: self.view.clone(),
        }
    }
}

impl<T: SessionEntity> WeakSessionClient<T> {
    pub fn upgrade(&self) -> Option<SessionClient<T>> {
        let sender = self.sender.upgrade()?;
        Some(SessionClient::new(sender, self.view.clone()))
    }
}

// =============================================================================
// 5. EXAMPLE USAGE (Test)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // --- Domain Definition ---

    #[derive(Debug)]
    struct Counter {
        id: String,
        count: u32,
        stopped: bool,
    }

    #[derive(Debug)]
    enum CounterEvent {
        Bump,
        Echo(u32),
        StartFeed,
        StopFeed,
    }

    #[derive(Debug)]
    enum CounterCommand {
        SlowEcho(u32),
        Feed,
        CancelFeed,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct CounterView {
        count: u32,
        stopped: bool,
    }

    struct CounterContext {
        feed_alive: Arc<AtomicBool>,
        echo_delay: Duration,
    }

    struct FeedGuard(Arc<AtomicBool>);

    impl Drop for FeedGuard {
        fn drop(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    impl CommandHandler<Counter> for CounterContext {
        fn dispatch(&self, command: CounterCommand) -> Task<Counter> {
            match command {
                CounterCommand::SlowEcho(value) => {
                    let delay = self.echo_delay;
                    Task::call(async move {
                        tokio::time::sleep(delay).await;
                        CounterEvent::Echo(value)
                    })
                }
                CounterCommand::Feed => {
                    self.feed_alive.store(true, Ordering::SeqCst);
                    let guard = FeedGuard(self.feed_alive.clone());
                    Task::feed("feed", move |_mailbox| async move {
                        let _guard = guard;
                        std::future::pending::<()>().await;
                    })
                }
                CounterCommand::CancelFeed => Task::Cancel("feed"),
            }
        }
    }

    impl SessionEntity for Counter {
        type Id = String;
        type Event = CounterEvent;
        type Command = CounterCommand;
        type View = CounterView;
        type Context = CounterContext;

        fn id(&self) -> &String {
            &self.id
        }

        fn handle_event(&mut self, event: CounterEvent) -> Vec<CounterCommand> {
            match event {
                CounterEvent::Bump => {
                    self.count += 1;
                    vec![CounterCommand::SlowEcho(self.count)]
                }
                CounterEvent::Echo(value) => {
                    self.count += value * 100;
                    Vec::new()
                }
                CounterEvent::StartFeed => vec![CounterCommand::Feed],
                CounterEvent::StopFeed => vec![CounterCommand::CancelFeed],
            }
        }

        fn on_stop(&mut self) -> Vec<CounterCommand> {
            self.stopped = true;
            Vec::new()
        }

        fn view(&self) -> CounterView {
            CounterView {
                count: self.count,
                stopped: self.stopped,
            }
        }
    }

    fn counter() -> Counter {
        Counter {
            id: "counter_1".into(),
            count: 0,
            stopped: false,
        }
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_call_result_is_posted_back_as_event() {
        let context = CounterContext {
            feed_alive: Arc::new(AtomicBool::new(false)),
            echo_delay: Duration::from_millis(1),
        };
        let (actor, client) = SessionActor::new(counter(), 8);
        let handle = tokio::spawn(actor.run(context));

        client.send(CounterEvent::Bump).await.unwrap();

        let mut watch = client.watch();
        let view = tokio::time::timeout(
            Duration::from_secs(1),
            watch.wait_for(|v| v.count == 101),
        )
        .await
        .expect("echo never arrived")
        .unwrap()
        .clone();
        assert_eq!(view.count, 101);

        let last = client.shutdown().await.unwrap();
        assert!(last.stopped);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_feeds_and_drops_late_results() {
        let alive = Arc::new(AtomicBool::new(false));
        let context = CounterContext {
            feed_alive: alive.clone(),
            echo_delay: Duration::from_millis(50),
        };
        let (actor, client) = SessionActor::new(counter(), 8);
        let handle = tokio::spawn(actor.run(context));

        client.send(CounterEvent::StartFeed).await.unwrap();
        client.send(CounterEvent::Bump).await.unwrap();
        let view = client.view().await.unwrap();
        assert_eq!(view.count, 1);
        assert!(alive.load(Ordering::SeqCst));

        // Echo is still sleeping when the session goes away.
        let last = client.shutdown().await.unwrap();
        handle.await.unwrap();
        assert_eq!(last.count, 1);
        assert!(last.stopped);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!alive.load(Ordering::SeqCst), "feed must be aborted on teardown");
        assert_eq!(client.latest().count, 1);
        assert_eq!(client.send(CounterEvent::Bump).await, Err(FrameworkError::ActorClosed));
    }

    #[tokio::test]
    async fn test_cancel_stops_only_the_named_feed() {
        let alive = Arc::new(AtomicBool::new(false));
        let context = CounterContext {
            feed_alive: alive.clone(),
            echo_delay: Duration::from_millis(1),
        };
        let (actor, client) = SessionActor::new(counter(), 8);
        let handle = tokio::spawn(actor.run(context));

        client.send(CounterEvent::StartFeed).await.unwrap();
        client.send(CounterEvent::StopFeed).await.unwrap();
        client.view().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!alive.load(Ordering::SeqCst));

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_weak_client_does_not_keep_session_alive() {
        let alive = Arc::new(AtomicBool::new(false));
        let context = CounterContext {
            feed_alive: alive.clone(),
            echo_delay: Duration::from_millis(1),
        };
        let (actor, client) = SessionActor::new(counter(), 8);
        let weak = client.downgrade();
        let handle = tokio::spawn(actor.run(context));

        client.send(CounterEvent::StartFeed).await.unwrap();
        let upgraded = weak.upgrade().expect("session still has a client");
        assert_eq!(upgraded.view().await.unwrap().count, 0);
        assert!(alive.load(Ordering::SeqCst));
        drop(upgraded);

        drop(client);
        handle.await.unwrap();
        assert!(weak.upgrade().is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!alive.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_every_client_tears_down() {
        let context = CounterContext {
            feed_alive: Arc::new(AtomicBool::new(false)),
            echo_delay: Duration::from_millis(1),
        };
        let (actor, client) = SessionActor::new(counter(), 8);
        let mut watch = client.watch();
        let handle = tokio::spawn(actor.run(context));

        drop(client);
        handle.await.unwrap();
        assert!(watch.borrow_and_update().stopped);
    }
}
