//! Entry completion tracking.
//!
//! Owns the two completion futures of a load:
//! - stream-flushed: every node has been parsed and inserted;
//! - entry-ready: the entry script's exports, `EntryValue::Empty` when the
//!   document had no external script, or the entry script's failure.
//!
//! Which script is the entry is decided lazily per load/error event: an
//! explicitly marked script always qualifies; otherwise only the last
//! external script in the container qualifies, and that can only be known
//! once the stream has flushed.

use crate::container::{Container, ScriptEvent, ScriptWatch};
use crate::deferred::{Deferred, Promise};
use crate::error::LoadError;
use crate::sandbox::{EntryValue, Sandbox};
use html::NodeKey;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct EntryTracker {
    entry: String,
    flushed: Deferred<()>,
    ready: Deferred<EntryValue>,
    external_scripts: Cell<usize>,
}

impl EntryTracker {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            flushed: Deferred::new(),
            ready: Deferred::new(),
            external_scripts: Cell::new(0),
        }
    }

    pub fn stream_flushed(&self) -> Promise<()> {
        self.flushed.promise()
    }

    pub fn entry_ready(&self) -> Promise<EntryValue> {
        self.ready.promise()
    }

    pub fn is_entry_ready_pending(&self) -> bool {
        self.ready.is_pending()
    }

    pub fn note_external_script(&self) {
        self.external_scripts.set(self.external_scripts.get() + 1);
    }

    pub fn external_scripts(&self) -> usize {
        self.external_scripts.get()
    }

    /// Marks the stream as fully inserted. With no external script seen,
    /// entry-ready settles to [`EntryValue::Empty`] as well.
    pub fn settle_stream_flushed(&self) -> bool {
        let first = self.flushed.resolve(());
        if first {
            log::debug!(
                target: "entry.tracker",
                "{}: stream flushed after {} external scripts",
                self.entry,
                self.external_scripts()
            );
            if self.external_scripts() == 0 {
                self.settle_entry_ready(EntryValue::Empty);
            }
        }
        first
    }

    pub fn settle_entry_ready(&self, value: EntryValue) -> bool {
        let first = self.ready.resolve(value);
        if first {
            log::debug!(target: "entry.tracker", "{}: entry ready", self.entry);
        }
        first
    }

    pub fn reject_entry_ready(&self, error: LoadError) -> bool {
        let message = error.to_string();
        let first = self.ready.reject(error);
        if first {
            log::debug!(target: "entry.tracker", "{}: entry failed: {message}", self.entry);
        }
        first
    }

    /// The pipeline failed: nothing more will be inserted. Rejects both
    /// futures so waiting listeners stop.
    pub fn fail(&self, error: LoadError) {
        self.flushed.reject(error.clone());
        self.reject_entry_ready(error);
    }

    /// Waits for the outcome of the external script at `key` and settles
    /// entry-ready if that script qualifies as the entry.
    ///
    /// The exports are read from `sandbox` when the load event is observed.
    pub async fn track_script<C: Container>(
        self: Rc<Self>,
        key: NodeKey,
        marked: bool,
        watch: ScriptWatch,
        container: Rc<RefCell<C>>,
        sandbox: Option<Rc<dyn Sandbox>>,
    ) {
        let Some(event) = watch.await else {
            log::debug!(target: "entry.tracker", "{}: script {key:?} dropped without an outcome", self.entry);
            return;
        };
        if !self.ready.is_pending() {
            log::trace!(target: "entry.tracker", "{}: script {key:?} settled after entry", self.entry);
            return;
        }
        // A load is captured as soon as it is observed; an error carries
        // its message.
        let outcome = match event {
            ScriptEvent::Loaded => Ok(EntryValue::capture(sandbox.as_deref())),
            ScriptEvent::Errored(message) => Err(message),
        };

        let qualifies = marked
            || match self.flushed.promise().await {
                Ok(()) => container.borrow().last_external_script() == Some(key),
                Err(_) => false,
            };
        if !qualifies {
            if let Err(message) = &outcome {
                log::debug!(
                    target: "entry.tracker",
                    "{}: non-entry script {key:?} failed: {message}",
                    self.entry
                );
            }
            return;
        }

        match outcome {
            Ok(value) => {
                self.settle_entry_ready(value);
            }
            Err(message) => {
                self.reject_entry_ready(LoadError::EntryScript {
                    entry: self.entry.clone(),
                    message,
                });
            }
        }
    }
}
