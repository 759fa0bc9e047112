//! The reconciler: [`SessionEntity`] implementation for one order's tracking session.
//!
//! Three sources feed the session: pull fetches, push snapshots and local timer ticks.
//! The merge rules are:
//!
//! - A snapshot replaces the previous one wholesale ("last wins").
//! - `COMPLETED` is terminal. Once seen, older phases arriving later are ignored, progress is
//!   pinned at 100 and the timer is stopped. Repeating `COMPLETED` changes nothing.
//! - The animation origin is the first drone position seen while `DELIVERING`, captured once.
//! - Ticks only count while `DELIVERING`. At 100 the session asks the server to complete the
//!   order, with at most one request in flight.

use crate::clients::{ApiError, CompletionReceipt};
use crate::framework::SessionEntity;
use crate::model::{
    interpolate, path_end, GeoPoint, LifecyclePhase, OrderId, OrderSnapshot, TrackingView,
};
use crate::tracking_actor::context::TrackingContext;
use crate::tracking_actor::{ProgressSimulator, TrackingCommand, TrackingError, TrackingEvent};
use tracing::{debug, info, warn};

/// State of one order's tracking view, from open to teardown.
#[derive(Debug)]
pub struct TrackingSession {
    requested: String,
    order_id: Option<OrderId>,
    snapshot: Option<OrderSnapshot>,
    progress: ProgressSimulator,
    start_point: Option<GeoPoint>,
    rendered: Option<GeoPoint>,
    completion_in_flight: bool,
    timer_running: bool,
    live: bool,
    error: Option<TrackingError>,
}

impl TrackingSession {
    pub fn new(requested: impl Into<String>, progress_step: u8) -> Self {
        Self {
            requested: requested.into(),
            order_id: None,
            snapshot: None,
            progress: ProgressSimulator::new(progress_step),
            start_point: None,
            rendered: None,
            completion_in_flight: false,
            timer_running: false,
            live: false,
            error: None,
        }
    }

    fn phase(&self) -> Option<LifecyclePhase> {
        self.snapshot.as_ref().map(|s| s.phase)
    }

    fn is_completed(&self) -> bool {
        self.phase() == Some(LifecyclePhase::Completed)
    }

    fn destination(&self) -> Option<GeoPoint> {
        self.snapshot.as_ref().and_then(|s| s.destination)
    }

    /// Drone position to draw for the current phase and progress.
    fn render(&self) -> Option<GeoPoint> {
        let destination = self.destination()?;
        match self.phase()? {
            LifecyclePhase::Completed => match self.start_point {
                Some(start) => interpolate(start, destination, 100.0),
                None => destination.is_finite().then_some(destination),
            },
            LifecyclePhase::Delivering => {
                let start = self.start_point?;
                interpolate(start, destination, f64::from(self.progress.percent()))
            }
            _ => None,
        }
    }

    fn start_timer(&mut self, commands: &mut Vec<TrackingCommand>) {
        if !self.timer_running {
            self.timer_running = true;
            commands.push(TrackingCommand::StartTimer);
        }
    }

    fn stop_timer(&mut self, commands: &mut Vec<TrackingCommand>) {
        if self.timer_running {
            self.timer_running = false;
            commands.push(TrackingCommand::StopTimer);
        }
    }

    fn clear_error_if(&mut self, predicate: impl Fn(&TrackingError) -> bool) {
        if self.error.as_ref().is_some_and(predicate) {
            self.error = None;
        }
    }

    fn apply_snapshot(&mut self, incoming: OrderSnapshot) -> Vec<TrackingCommand> {
        let mut commands = Vec::new();

        if self.order_id.as_ref() != Some(&incoming.id) {
            warn!(order_id = %self.requested, received = %incoming.id, "Ignoring snapshot for another order");
            return commands;
        }
        if self.is_completed() && !incoming.phase.is_terminal() {
            debug!(order_id = %incoming.id, phase = %incoming.phase, "Ignoring stale snapshot after completion");
            return commands;
        }

        let previous = self.phase();
        let phase = incoming.phase;
        let drone = incoming.drone;
        self.snapshot = Some(incoming);
        if previous != Some(phase) {
            info!(order_id = %self.requested, %phase, "Phase changed");
        }

        match phase {
            LifecyclePhase::Completed => {
                self.progress.finish();
                self.stop_timer(&mut commands);
                self.clear_error_if(|e| matches!(e, TrackingError::CompletionFailed(_)));
            }
            LifecyclePhase::Delivering => {
                if self.start_point.is_none() {
                    if let Some(drone) = drone.filter(GeoPoint::is_finite) {
                        debug!(order_id = %self.requested, start = %drone, "Captured start point");
                        self.start_point = Some(drone);
                    }
                }
                self.start_timer(&mut commands);
            }
            _ => self.stop_timer(&mut commands),
        }

        self.rendered = self.render();
        commands
    }

    fn on_tick(&mut self) -> Vec<TrackingCommand> {
        if self.phase() != Some(LifecyclePhase::Delivering) {
            return Vec::new();
        }

        let progress = self.progress.advance();
        self.rendered = self.render();
        debug!(order_id = %self.requested, progress, "Tick");

        if self.progress.is_finished() && !self.completion_in_flight {
            if let Some(order_id) = self.order_id.clone() {
                info!(%order_id, "Delivery animation finished, requesting completion");
                self.completion_in_flight = true;
                return vec![TrackingCommand::RequestCompletion(order_id)];
            }
        }
        Vec::new()
    }

    fn on_fetched(&mut self, result: Result<OrderSnapshot, ApiError>) -> Vec<TrackingCommand> {
        match result {
            Ok(snapshot) => {
                self.clear_error_if(|e| matches!(e, TrackingError::FetchFailed(_)));
                self.apply_snapshot(snapshot)
            }
            Err(ApiError::NotFound) => {
                warn!(order_id = %self.requested, "Order not found");
                self.error = Some(TrackingError::OrderNotFound(self.requested.clone()));
                Vec::new()
            }
            Err(err) => {
                warn!(order_id = %self.requested, error = %err, "Fetch failed");
                // A completed order has nothing left to load.
                if !self.is_completed() {
                    self.error = Some(TrackingError::FetchFailed(err.to_string()));
                }
                Vec::new()
            }
        }
    }

    fn on_completion(
        &mut self,
        result: Result<CompletionReceipt, ApiError>,
    ) -> Vec<TrackingCommand> {
        self.completion_in_flight = false;
        let Some(order_id) = self.order_id.clone() else {
            return Vec::new();
        };

        match result {
            Ok(receipt) => {
                let completed = match (receipt.snapshot, &self.snapshot) {
                    (Some(s), _) if s.phase.is_terminal() => Some(s),
                    (_, Some(current)) => Some(current.with_phase(LifecyclePhase::Completed)),
                    _ => None,
                };
                let mut commands = completed
                    .map(|s| self.apply_snapshot(s))
                    .unwrap_or_default();
                commands.push(TrackingCommand::FetchOrder(order_id));
                commands
            }
            Err(err) => {
                if !self.is_completed() {
                    warn!(%order_id, error = %err, "Completion failed, will retry on next tick");
                    self.error = Some(TrackingError::CompletionFailed(err.to_string()));
                }
                Vec::new()
            }
        }
    }
}

impl SessionEntity for TrackingSession {
    type Id = String;
    type Event = TrackingEvent;
    type Command = TrackingCommand;
    type View = TrackingView;
    type Context = TrackingContext;

    fn id(&self) -> &String {
        &self.requested
    }

    fn on_start(&mut self) -> Vec<TrackingCommand> {
        match OrderId::parse(&self.requested) {
            Ok(order_id) => {
                self.order_id = Some(order_id.clone());
                vec![
                    TrackingCommand::FetchOrder(order_id.clone()),
                    TrackingCommand::Subscribe(order_id),
                ]
            }
            Err(err) => {
                warn!(error = %err, "Refusing to track");
                self.error = Some(TrackingError::InvalidIdentifier(self.requested.clone()));
                Vec::new()
            }
        }
    }

    fn handle_event(&mut self, event: TrackingEvent) -> Vec<TrackingCommand> {
        if self.order_id.is_none() {
            return Vec::new();
        }

        match event {
            TrackingEvent::Fetched(result) => self.on_fetched(result),
            TrackingEvent::ChannelOpened => {
                self.live = true;
                Vec::new()
            }
            TrackingEvent::Pushed(snapshot) => self.apply_snapshot(snapshot),
            TrackingEvent::ChannelFailed(err) => {
                warn!(order_id = %self.requested, error = %err, "Push channel failed");
                self.live = false;
                self.error = Some(TrackingError::ChannelFailed(err.to_string()));
                Vec::new()
            }
            TrackingEvent::ChannelClosed => {
                info!(order_id = %self.requested, "Push channel closed by server");
                self.live = false;
                Vec::new()
            }
            TrackingEvent::Tick => self.on_tick(),
            TrackingEvent::CompletionFinished(result) => self.on_completion(result),
            TrackingEvent::Retry => match (&self.error, &self.order_id) {
                (Some(TrackingError::FetchFailed(_)), Some(order_id)) => {
                    let order_id = order_id.clone();
                    self.error = None;
                    vec![TrackingCommand::FetchOrder(order_id)]
                }
                _ => Vec::new(),
            },
            TrackingEvent::DismissError => {
                self.clear_error_if(|e| !e.is_fatal());
                Vec::new()
            }
        }
    }

    fn on_stop(&mut self) -> Vec<TrackingCommand> {
        self.live = false;
        self.timer_running = false;
        if self.order_id.is_none() {
            return Vec::new();
        }
        vec![TrackingCommand::Unsubscribe, TrackingCommand::StopTimer]
    }

    fn view(&self) -> TrackingView {
        TrackingView {
            order_id: self.requested.clone(),
            phase: self.phase(),
            progress_percent: self.progress.percent(),
            rendered_drone_point: self.rendered,
            destination_point: self.destination(),
            start_point: self.start_point,
            path_end: self
                .start_point
                .zip(self.destination())
                .map(|(start, end)| path_end(start, end)),
            error: self.error.clone(),
            completion_in_flight: self.completion_in_flight,
            live: self.live,
            order: self.snapshot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ChannelError;

    fn order(phase: LifecyclePhase) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::parse("order-1").unwrap(),
            phase,
            total: 12.5,
            items: Vec::new(),
            destination: Some(GeoPoint::new(10.0, 20.0)),
            drone: Some(GeoPoint::new(10.0, 10.0)),
            delivery_address: None,
            drone_id: Some("drone-7".into()),
            updated_at: None,
        }
    }

    fn started() -> TrackingSession {
        let mut session = TrackingSession::new("order-1", 5);
        let commands = session.on_start();
        assert_eq!(commands.len(), 2);
        session
    }

    fn tick_n(session: &mut TrackingSession, n: usize) -> Vec<TrackingCommand> {
        (0..n)
            .flat_map(|_| session.handle_event(TrackingEvent::Tick))
            .collect()
    }

    fn receipt(snapshot: Option<OrderSnapshot>) -> CompletionReceipt {
        CompletionReceipt {
            message: Some("Order delivered successfully".into()),
            snapshot,
        }
    }

    #[test]
    fn start_fetches_and_subscribes() {
        let mut session = TrackingSession::new("order-1", 5);
        let id = OrderId::parse("order-1").unwrap();
        assert_eq!(
            session.on_start(),
            vec![
                TrackingCommand::FetchOrder(id.clone()),
                TrackingCommand::Subscribe(id)
            ]
        );
    }

    #[test]
    fn scenario_invalid_identifier_fails_fast() {
        let mut session = TrackingSession::new("  ", 5);
        assert!(session.on_start().is_empty());

        let view = session.view();
        assert!(matches!(view.error, Some(TrackingError::InvalidIdentifier(_))));
        assert!(view.has_fatal_error());

        // Nothing can move an invalid session.
        assert!(session.handle_event(TrackingEvent::Retry).is_empty());
        assert!(session.handle_event(TrackingEvent::DismissError).is_empty());
        assert!(session.on_stop().is_empty());
        assert!(session.view().error.is_some());
    }

    #[test]
    fn scenario_pending_to_delivering_renders_midpoint() {
        let mut session = started();
        session.handle_event(TrackingEvent::Fetched(Ok(order(LifecyclePhase::Pending))));
        assert!(session.view().rendered_drone_point.is_none());

        let commands = session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        assert_eq!(commands, vec![TrackingCommand::StartTimer]);

        let commands = tick_n(&mut session, 10);
        assert!(commands.is_empty());

        let view = session.view();
        assert_eq!(view.progress_percent, 50);
        assert_eq!(view.rendered_drone_point, Some(GeoPoint::new(10.0, 15.0)));
        assert_eq!(view.start_point, Some(GeoPoint::new(10.0, 10.0)));
        assert_eq!(view.path_end, Some(GeoPoint::new(10.0, 20.0)));
    }

    #[test]
    fn scenario_completion_success_is_sticky() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));

        let commands = tick_n(&mut session, 20);
        let id = OrderId::parse("order-1").unwrap();
        assert_eq!(commands, vec![TrackingCommand::RequestCompletion(id.clone())]);
        assert!(session.view().completion_in_flight);
        assert_eq!(session.view().rendered_drone_point, Some(GeoPoint::new(10.0, 20.0)));

        let commands = session.handle_event(TrackingEvent::CompletionFinished(Ok(receipt(Some(
            order(LifecyclePhase::Completed),
        )))));
        assert_eq!(
            commands,
            vec![TrackingCommand::StopTimer, TrackingCommand::FetchOrder(id)]
        );

        let view = session.view();
        assert!(view.is_completed());
        assert!(!view.completion_in_flight);

        // A stale push from before the server caught up.
        assert!(session
            .handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)))
            .is_empty());
        assert_eq!(session.view(), view);
    }

    #[test]
    fn completion_without_returned_order_is_applied_optimistically() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        tick_n(&mut session, 20);

        session.handle_event(TrackingEvent::CompletionFinished(Ok(receipt(None))));

        let view = session.view();
        assert!(view.is_completed());
        assert_eq!(view.order.unwrap().total, 12.5);
    }

    #[test]
    fn scenario_completion_failure_retries_once_per_tick() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        tick_n(&mut session, 20);

        let commands = session.handle_event(TrackingEvent::CompletionFinished(Err(
            ApiError::Transport("connection reset".into()),
        )));
        assert!(commands.is_empty());

        let view = session.view();
        assert_eq!(view.phase, Some(LifecyclePhase::Delivering));
        assert!(!view.completion_in_flight);
        assert!(matches!(view.error, Some(TrackingError::CompletionFailed(_))));
        assert_eq!(view.progress_percent, 100);

        let id = OrderId::parse("order-1").unwrap();
        assert_eq!(
            session.handle_event(TrackingEvent::Tick),
            vec![TrackingCommand::RequestCompletion(id)]
        );
        // Still in flight: further ticks do not pile up requests.
        assert!(tick_n(&mut session, 3).is_empty());
    }

    #[test]
    fn repeated_completed_snapshot_is_a_no_op() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Completed)));
        let first = session.view();

        let commands = session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Completed)));
        assert!(commands.is_empty());
        assert_eq!(session.view(), first);
    }

    #[test]
    fn late_joiner_sees_finished_delivery() {
        let mut session = started();
        let commands = session.handle_event(TrackingEvent::Fetched(Ok(order(LifecyclePhase::Completed))));
        assert!(commands.is_empty());

        let view = session.view();
        assert_eq!(view.progress_percent, 100);
        assert_eq!(view.rendered_drone_point, view.destination_point);
        assert!(tick_n(&mut session, 5).is_empty());
    }

    #[test]
    fn progress_is_monotonic_across_phase_regressions() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        tick_n(&mut session, 4);
        assert_eq!(session.view().progress_percent, 20);

        let commands = session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::ReadyForPickup)));
        assert_eq!(commands, vec![TrackingCommand::StopTimer]);
        tick_n(&mut session, 4);
        assert_eq!(session.view().progress_percent, 20);

        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        tick_n(&mut session, 1);
        assert_eq!(session.view().progress_percent, 25);
    }

    #[test]
    fn start_point_survives_later_drone_updates() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));

        let mut moved = order(LifecyclePhase::Delivering);
        moved.drone = Some(GeoPoint::new(10.0, 18.0));
        assert!(session.handle_event(TrackingEvent::Pushed(moved)).is_empty());

        tick_n(&mut session, 10);
        let view = session.view();
        assert_eq!(view.start_point, Some(GeoPoint::new(10.0, 10.0)));
        assert_eq!(view.rendered_drone_point, Some(GeoPoint::new(10.0, 15.0)));
    }

    #[test]
    fn start_point_waits_for_drone_coordinates() {
        let mut session = started();
        let mut blind = order(LifecyclePhase::Delivering);
        blind.drone = None;
        session.handle_event(TrackingEvent::Pushed(blind));
        tick_n(&mut session, 2);
        assert_eq!(session.view().rendered_drone_point, None);

        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        assert_eq!(session.view().start_point, Some(GeoPoint::new(10.0, 10.0)));
        assert_eq!(
            session.view().rendered_drone_point,
            interpolate(GeoPoint::new(10.0, 10.0), GeoPoint::new(10.0, 20.0), 10.0)
        );
    }

    #[test]
    fn missing_destination_renders_nothing() {
        let mut session = started();
        let mut nowhere = order(LifecyclePhase::Delivering);
        nowhere.destination = None;
        session.handle_event(TrackingEvent::Pushed(nowhere));
        tick_n(&mut session, 3);

        let view = session.view();
        assert_eq!(view.destination_point, None);
        assert_eq!(view.rendered_drone_point, None);
        assert_eq!(view.path_end, None);
    }

    #[test]
    fn fetch_errors_are_classified() {
        let mut session = started();
        session.handle_event(TrackingEvent::Fetched(Err(ApiError::NotFound)));
        assert_eq!(
            session.view().error,
            Some(TrackingError::OrderNotFound("order-1".into()))
        );
        // Not found cannot be retried or dismissed.
        assert!(session.handle_event(TrackingEvent::Retry).is_empty());
        session.handle_event(TrackingEvent::DismissError);
        assert!(session.view().error.is_some());

        let mut session = started();
        session.handle_event(TrackingEvent::Fetched(Err(ApiError::Timeout)));
        assert!(matches!(session.view().error, Some(TrackingError::FetchFailed(_))));
    }

    #[test]
    fn retry_refetches_only_after_fetch_failure() {
        let mut session = started();
        assert!(session.handle_event(TrackingEvent::Retry).is_empty());

        session.handle_event(TrackingEvent::Fetched(Err(ApiError::Status {
            status: 500,
            message: "boom".into(),
        })));
        let id = OrderId::parse("order-1").unwrap();
        assert_eq!(
            session.handle_event(TrackingEvent::Retry),
            vec![TrackingCommand::FetchOrder(id)]
        );
        assert_eq!(session.view().error, None);
    }

    #[test]
    fn channel_failure_keeps_last_snapshot() {
        let mut session = started();
        session.handle_event(TrackingEvent::ChannelOpened);
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Preparing)));
        assert!(session.view().live);

        let commands = session.handle_event(TrackingEvent::ChannelFailed(ChannelError::Protocol(
            "reset".into(),
        )));
        assert!(commands.is_empty());

        let view = session.view();
        assert!(!view.live);
        assert_eq!(view.phase, Some(LifecyclePhase::Preparing));
        assert!(matches!(view.error, Some(TrackingError::ChannelFailed(_))));

        session.handle_event(TrackingEvent::DismissError);
        assert_eq!(session.view().error, None);
    }

    #[test]
    fn snapshots_for_other_orders_are_ignored() {
        let mut session = started();
        let mut other = order(LifecyclePhase::Delivering);
        other.id = OrderId::parse("order-2").unwrap();
        assert!(session.handle_event(TrackingEvent::Pushed(other)).is_empty());
        assert_eq!(session.view().phase, None);
    }

    #[test]
    fn refetch_failure_after_completion_is_silent() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Completed)));

        let commands = session.handle_event(TrackingEvent::Fetched(Err(ApiError::Timeout)));
        assert!(commands.is_empty());
        let view = session.view();
        assert!(view.is_completed());
        assert_eq!(view.error, None);

        // Before completion the same failure is reported.
        let mut fresh = started();
        fresh.handle_event(TrackingEvent::Fetched(Err(ApiError::Timeout)));
        assert!(matches!(fresh.view().error, Some(TrackingError::FetchFailed(_))));
    }

    #[test]
    fn stop_releases_timer_and_subscription() {
        let mut session = started();
        session.handle_event(TrackingEvent::Pushed(order(LifecyclePhase::Delivering)));
        assert_eq!(
            session.on_stop(),
            vec![TrackingCommand::Unsubscribe, TrackingCommand::StopTimer]
        );
        assert!(!session.view().live);
    }
}
