use crate::clients::{Clock, CompletionNotifier, OrderApi, PushChannel, PushMessage};
use crate::framework::{CommandHandler, Task};
use crate::tracking_actor::{TrackingCommand, TrackingEvent, TrackingSession};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

const PUSH_FEED: &str = "push";
const TIMER_FEED: &str = "timer";

/// Dependencies of a tracking session, and how its commands run.
#[derive(Clone)]
pub struct TrackingContext {
    api: Arc<dyn OrderApi>,
    notifier: CompletionNotifier,
    push: Arc<dyn PushChannel>,
    clock: Arc<dyn Clock>,
}

impl TrackingContext {
    pub fn new(api: Arc<dyn OrderApi>, push: Arc<dyn PushChannel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifier: CompletionNotifier::new(api.clone()),
            api,
            push,
            clock,
        }
    }
}

impl CommandHandler<TrackingSession> for TrackingContext {
    fn dispatch(&self, command: TrackingCommand) -> Task<TrackingSession> {
        match command {
            TrackingCommand::FetchOrder(order_id) => {
                let api = self.api.clone();
                Task::call(async move { TrackingEvent::Fetched(api.fetch_order(&order_id).await) })
            }
            TrackingCommand::RequestCompletion(order_id) => {
                let notifier = self.notifier.clone();
                Task::call(async move {
                    TrackingEvent::CompletionFinished(notifier.complete(&order_id).await)
                })
            }
            TrackingCommand::Subscribe(order_id) => {
                let push = self.push.clone();
                Task::feed(PUSH_FEED, move |mailbox| async move {
                    let mut subscription = match push.subscribe(&order_id).await {
                        Ok(subscription) => subscription,
                        Err(err) => {
                            warn!(%order_id, error = %err, "Subscription failed");
                            mailbox.post(TrackingEvent::ChannelFailed(err)).await;
                            return;
                        }
                    };
                    if !mailbox.post(TrackingEvent::ChannelOpened).await {
                        return;
                    }

                    loop {
                        let event = match subscription.next().await {
                            Some(PushMessage::Snapshot(snapshot)) => TrackingEvent::Pushed(snapshot),
                            Some(PushMessage::Error(err)) => {
                                mailbox.post(TrackingEvent::ChannelFailed(err)).await;
                                break;
                            }
                            Some(PushMessage::Closed) | None => {
                                mailbox.post(TrackingEvent::ChannelClosed).await;
                                break;
                            }
                        };
                        if !mailbox.post(event).await {
                            break;
                        }
                    }
                    debug!(%order_id, "Push feed finished");
                })
            }
            TrackingCommand::Unsubscribe => Task::Cancel(PUSH_FEED),
            TrackingCommand::StartTimer => {
                let mut ticks = self.clock.ticker();
                Task::feed(TIMER_FEED, move |mailbox| async move {
                    while ticks.next().await.is_some() {
                        if !mailbox.post(TrackingEvent::Tick).await {
                            break;
                        }
                    }
                })
            }
            TrackingCommand::StopTimer => Task::Cancel(TIMER_FEED),
        }
    }
}
