//! Change notifications.
//!
//! A data service publishes a [`ChangeEvent`] to its [`ChangeNotifier`] after every
//! successful save or remove. Delivery is synchronous: every listener registered under the
//! service's event name has run by the time the mutating operation returns.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use datalayer::event::{ChangeNotifier, DEFAULT_EVENT_NAME};
//!
//! let notifier = Arc::new(ChangeNotifier::new());
//! notifier.on(DEFAULT_EVENT_NAME, |event| {
//!     println!("{} {:?}", event.kind, event.record.primary_id());
//! });
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, mpsc},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Event name used when the service is not configured with another one.
pub const DEFAULT_EVENT_NAME: &str = "object-change";

/// The kind of change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification payload for a completed save or remove.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// The record as saved, or as it was before removal.
    pub record: Record,
    pub kind: ChangeKind,
    /// Name of the collection the change happened in.
    pub collection: String,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(record: Record, kind: ChangeKind, collection: impl Into<String>) -> Self {
        Self {
            record,
            kind,
            collection: collection.into(),
            at: Utc::now(),
        }
    }
}

/// A listener invoked with every event emitted under the name it was registered for.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Event-subscribable object a data service publishes change events to.
///
/// Listeners are keyed by event name, so a single notifier can be shared by several
/// services configured with different event names.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<HashMap<String, Vec<ChangeListener>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registers a listener that forwards every `event` into a channel.
    ///
    /// Events sent after the receiver is dropped are discarded.
    pub fn subscribe(&self, event: impl Into<String>) -> mpsc::Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.on(event, move |change: &ChangeEvent| {
            let _ = sender.send(change.clone());
        });
        receiver
    }

    /// Delivers `change` to every listener registered for `event`, in registration order.
    ///
    /// Returns the number of listeners called. Listeners may register further listeners;
    /// those only see subsequent events.
    pub fn emit(&self, event: &str, change: &ChangeEvent) -> usize {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();

        log::trace!("emitting {} {} to {} listener(s)", event, change.kind, listeners.len());

        for listener in &listeners {
            listener(change);
        }

        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Removes every listener registered for `event`.
    pub fn remove_listeners(&self, event: &str) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event);
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f.debug_struct("ChangeNotifier")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
