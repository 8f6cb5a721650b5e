/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives [`Event`]s from publishers and fires the registered handlers.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

// How long the event bus thread blocks on an empty channel before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handlers fired for each kind of event: the default loggers (if enabled), followed by handlers
/// registered by the library user.
pub struct EventHandlers {
    generate_board_handlers: Vec<HandlerPtr<GenerateBoardEvent>>,
    apply_changes_handlers: Vec<HandlerPtr<ApplyChangesEvent>>,
    reject_mutation_handlers: Vec<HandlerPtr<RejectMutationEvent>>,
    broadcast_changes_handlers: Vec<HandlerPtr<BroadcastChangesEvent>>,
    send_snapshot_handlers: Vec<HandlerPtr<SendSnapshotEvent>>,
    receive_changes_handlers: Vec<HandlerPtr<ReceiveChangesEvent>>,
    checksum_mismatch_handlers: Vec<HandlerPtr<ChecksumMismatchEvent>>,
    sequence_gap_handlers: Vec<HandlerPtr<SequenceGapEvent>>,
    malformed_changes_handlers: Vec<HandlerPtr<MalformedChangesEvent>>,
    receive_pong_handlers: Vec<HandlerPtr<ReceivePongEvent>>,
    request_snapshot_handlers: Vec<HandlerPtr<RequestSnapshotEvent>>,
    install_snapshot_handlers: Vec<HandlerPtr<InstallSnapshotEvent>>,
    discard_snapshot_handlers: Vec<HandlerPtr<DiscardSnapshotEvent>>,
    snapshot_timeout_handlers: Vec<HandlerPtr<SnapshotTimeoutEvent>>,
    unrecoverable_desync_handlers: Vec<HandlerPtr<UnrecoverableDesyncEvent>>,
    disconnect_handlers: Vec<HandlerPtr<DisconnectEvent>>,
    any_event_handlers: Vec<HandlerPtr<Event>>,
}

impl EventHandlers {
    /// Create a set of handlers that contains the default loggers if `log_events` is set, and is
    /// otherwise empty.
    pub fn new(log_events: bool) -> Self {
        fn loggers<T: Logger>(log_events: bool) -> Vec<HandlerPtr<T>> {
            if log_events {
                vec![T::get_logger()]
            } else {
                Vec::new()
            }
        }

        Self {
            generate_board_handlers: loggers(log_events),
            apply_changes_handlers: loggers(log_events),
            reject_mutation_handlers: loggers(log_events),
            broadcast_changes_handlers: loggers(log_events),
            send_snapshot_handlers: loggers(log_events),
            receive_changes_handlers: loggers(log_events),
            checksum_mismatch_handlers: loggers(log_events),
            sequence_gap_handlers: loggers(log_events),
            malformed_changes_handlers: loggers(log_events),
            receive_pong_handlers: loggers(log_events),
            request_snapshot_handlers: loggers(log_events),
            install_snapshot_handlers: loggers(log_events),
            discard_snapshot_handlers: loggers(log_events),
            snapshot_timeout_handlers: loggers(log_events),
            unrecoverable_desync_handlers: loggers(log_events),
            disconnect_handlers: loggers(log_events),
            any_event_handlers: Vec::new(),
        }
    }

    /// Register a handler that is invoked for every event, after the event's loggers.
    pub fn on_event(mut self, handler: impl Fn(&Event) + Send + 'static) -> Self {
        self.any_event_handlers.push(Box::new(handler));
        self
    }

    /// Register a handler that is invoked after an observer detects a checksum mismatch.
    pub fn on_checksum_mismatch(
        mut self,
        handler: impl Fn(&ChecksumMismatchEvent) + Send + 'static,
    ) -> Self {
        self.checksum_mismatch_handlers.push(Box::new(handler));
        self
    }

    /// Register a handler that is invoked after an observer gives up on resynchronizing.
    pub fn on_unrecoverable_desync(
        mut self,
        handler: impl Fn(&UnrecoverableDesyncEvent) + Send + 'static,
    ) -> Self {
        self.unrecoverable_desync_handlers.push(Box::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.generate_board_handlers.is_empty()
            && self.apply_changes_handlers.is_empty()
            && self.reject_mutation_handlers.is_empty()
            && self.broadcast_changes_handlers.is_empty()
            && self.send_snapshot_handlers.is_empty()
            && self.receive_changes_handlers.is_empty()
            && self.checksum_mismatch_handlers.is_empty()
            && self.sequence_gap_handlers.is_empty()
            && self.malformed_changes_handlers.is_empty()
            && self.receive_pong_handlers.is_empty()
            && self.request_snapshot_handlers.is_empty()
            && self.install_snapshot_handlers.is_empty()
            && self.discard_snapshot_handlers.is_empty()
            && self.snapshot_timeout_handlers.is_empty()
            && self.unrecoverable_desync_handlers.is_empty()
            && self.disconnect_handlers.is_empty()
            && self.any_event_handlers.is_empty()
    }

    pub fn fire_handlers(&self, event: Event) {
        fn fire<T>(handlers: &[HandlerPtr<T>], event: &T) {
            handlers.iter().for_each(|handler| handler(event))
        }

        match &event {
            Event::GenerateBoard(e) => fire(&self.generate_board_handlers, e),
            Event::ApplyChanges(e) => fire(&self.apply_changes_handlers, e),
            Event::RejectMutation(e) => fire(&self.reject_mutation_handlers, e),
            Event::BroadcastChanges(e) => fire(&self.broadcast_changes_handlers, e),
            Event::SendSnapshot(e) => fire(&self.send_snapshot_handlers, e),
            Event::ReceiveChanges(e) => fire(&self.receive_changes_handlers, e),
            Event::ChecksumMismatch(e) => fire(&self.checksum_mismatch_handlers, e),
            Event::SequenceGap(e) => fire(&self.sequence_gap_handlers, e),
            Event::MalformedChanges(e) => fire(&self.malformed_changes_handlers, e),
            Event::ReceivePong(e) => fire(&self.receive_pong_handlers, e),
            Event::RequestSnapshot(e) => fire(&self.request_snapshot_handlers, e),
            Event::InstallSnapshot(e) => fire(&self.install_snapshot_handlers, e),
            Event::DiscardSnapshot(e) => fire(&self.discard_snapshot_handlers, e),
            Event::SnapshotTimeout(e) => fire(&self.snapshot_timeout_handlers, e),
            Event::UnrecoverableDesync(e) => fire(&self.unrecoverable_desync_handlers, e),
            Event::Disconnect(e) => fire(&self.disconnect_handlers, e),
        }
        fire(&self.any_event_handlers, &event);
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => return,
            Err(mpsc::TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher has been dropped.
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}

/// A handle to a running event bus thread. When this value is dropped, the thread is shut down after
/// it finishes the event it is currently handling.
pub struct EventBus {
    publisher: Sender<Event>,
    thread: Option<JoinHandle<()>>,
    shutdown: Sender<()>,
}

impl EventBus {
    pub fn start(event_handlers: EventHandlers) -> Self {
        let (publisher, subscriber) = mpsc::channel();
        let (shutdown, shutdown_receiver) = mpsc::channel();
        let thread = start_event_bus(event_handlers, subscriber, shutdown_receiver);
        Self {
            publisher,
            thread: Some(thread),
            shutdown,
        }
    }

    /// A sending end for [`EventPublisher::new`].
    pub fn publisher(&self) -> Sender<Event> {
        self.publisher.clone()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
