//! Outbound lifecycle events and the progress contract.
//!
//! The room never talks to a process-wide bus. It is handed an [`EventSink`]
//! and reports through it; the loader reports through a [`ProgressSink`] that
//! the [`EventForwarder`] maps onto [`RoomEvent`]s.

use std::cell::Cell;

use futures::channel::mpsc::UnboundedSender;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomEvent {
    /// Aggregated loading progress, `0..=100`.
    LoadingProgress { progress: u8 },
    LoadingComplete,
    Error { message: String },
    ApplicationLaunched,
    /// Inbound: the 2D application asks to return to the room.
    ExitApplication,
}

impl RoomEvent {
    /// Name of the event on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::LoadingProgress { .. } => "room-loading-progress",
            RoomEvent::LoadingComplete => "room-loading-complete",
            RoomEvent::Error { .. } => "room-error",
            RoomEvent::ApplicationLaunched => "application-launched",
            RoomEvent::ExitApplication => "exit-application",
        }
    }
}

pub trait EventSink {
    fn emit(&self, event: RoomEvent);
}

impl<F: Fn(RoomEvent)> EventSink for F {
    fn emit(&self, event: RoomEvent) {
        self(event)
    }
}

impl EventSink for UnboundedSender<RoomEvent> {
    fn emit(&self, event: RoomEvent) {
        if let Err(e) = self.unbounded_send(event) {
            log::warn!("Dropping {} event: receiver is gone", e.into_inner().name());
        }
    }
}

/// Callbacks of the resource loader.
pub trait ProgressSink {
    fn on_progress(&self, asset: &str, loaded: usize, total: usize);

    fn on_load(&self);

    fn on_error(&self, asset: &str, message: &str);
}

/// Maps loader callbacks onto room events. Progress is only emitted when the
/// percentage strictly increases.
pub struct EventForwarder<'a> {
    sink: &'a dyn EventSink,
    last_progress: Cell<Option<u8>>,
}

impl<'a> EventForwarder<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self {
            sink,
            last_progress: Cell::new(None),
        }
    }
}

impl ProgressSink for EventForwarder<'_> {
    fn on_progress(&self, asset: &str, loaded: usize, total: usize) {
        let progress = if total == 0 {
            100
        } else {
            ((loaded.min(total) * 100) / total) as u8
        };
        if self.last_progress.get().is_some_and(|last| progress <= last) {
            return;
        }
        log::trace!("{asset} settled: {loaded}/{total} ({progress}%)");
        self.last_progress.set(Some(progress));
        self.sink.emit(RoomEvent::LoadingProgress { progress });
    }

    fn on_load(&self) {
        self.sink.emit(RoomEvent::LoadingComplete);
    }

    fn on_error(&self, asset: &str, message: &str) {
        self.sink.emit(RoomEvent::Error {
            message: format!("{asset}: {message}"),
        });
    }
}

