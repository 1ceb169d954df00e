//! Draft autosave service
//!
//! Mirrors in-progress form state to local storage on a debounce timer and
//! offers the last persisted snapshot back once when the form is mounted
//! again. Storage problems are logged and otherwise ignored: autosave must
//! never interrupt the user or touch the in-memory form state.
//!
//! Typical lifecycle for a form component:
//!
//! 1. `initialize` on mount, with a callback that asks the user whether to
//!    restore the draft.
//! 2. `observe` on every change.
//! 3. `discard` after a successful submit.
//! 4. Drop on unmount, which cancels any pending save.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use deltagarportalen_domain::{DraftKey, DraftPayload, DraftSnapshot};
use serde::Serialize;
use serde_json::Value;

use crate::infrastructure::platform::{default_storage, PlatformStorage, PlatformTime};
use crate::infrastructure::scheduler::ScheduledTask;
use crate::ports::outbound::{StorageProvider, TimeProvider};

/// Default quiet period before a change is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Callback handed the snapshot that can be restored.
pub type RestoreCallback = Box<dyn FnMut(&DraftSnapshot) + Send>;

#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    pub debounce: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Debounced draft persistence for one form.
///
/// One controller per mounted form. The restore check in [`initialize`]
/// runs once per controller, however often it is called afterwards.
///
/// [`initialize`]: AutosaveController::initialize
pub struct AutosaveController<S: StorageProvider, T: TimeProvider> {
    key: DraftKey,
    storage: S,
    time: T,
    config: AutosaveConfig,
    initialized: bool,
    restorable: Option<DraftSnapshot>,
    on_restore: Option<RestoreCallback>,
    save_task: ScheduledTask,
    /// Latest observed payload not yet written. Shared with the timer and
    /// locked for the duration of every storage write or removal.
    pending: Arc<Mutex<Option<DraftPayload>>>,
}

impl AutosaveController<PlatformStorage, PlatformTime> {
    /// Controller backed by the current platform's storage and clock.
    pub fn for_platform(key: DraftKey) -> Self {
        Self::new(key, default_storage(), PlatformTime::default())
    }
}

impl<S: StorageProvider, T: TimeProvider> AutosaveController<S, T> {
    pub fn new(key: DraftKey, storage: S, time: T) -> Self {
        Self::with_config(key, storage, time, AutosaveConfig::default())
    }

    pub fn with_config(key: DraftKey, storage: S, time: T, config: AutosaveConfig) -> Self {
        Self {
            key,
            storage,
            time,
            config,
            initialized: false,
            restorable: None,
            on_restore: None,
            save_task: ScheduledTask::new(),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// Look for a stored draft and offer it for restoration.
    ///
    /// On the first call the stored snapshot (if any) is loaded and
    /// `on_restore` is invoked with it. Nothing is applied to the form: the
    /// caller decides, usually after asking the user. A snapshot equal to
    /// `current` is not offered since there is nothing to recover.
    ///
    /// Later calls neither reload storage nor invoke any callback; they only
    /// return the snapshot found the first time.
    pub fn initialize<F>(&mut self, current: &DraftPayload, on_restore: F) -> Option<&DraftSnapshot>
    where
        F: FnMut(&DraftSnapshot) + Send + 'static,
    {
        if self.initialized {
            return self.restorable.as_ref();
        }
        self.initialized = true;
        self.on_restore = Some(Box::new(on_restore));

        self.restorable = self
            .load_snapshot()
            .filter(|snapshot| snapshot.payload() != current);

        if let Some(snapshot) = &self.restorable {
            tracing::info!(
                key = %self.key,
                saved_at = %snapshot.saved_at(),
                "Found restorable draft"
            );
            if let Some(callback) = self.on_restore.as_mut() {
                callback(snapshot);
            }
        }

        self.restorable.as_ref()
    }

    /// Record new form state and (re)start the debounce timer.
    ///
    /// Only the last payload observed within a debounce window is written.
    pub fn observe(&mut self, data: DraftPayload) {
        match self.pending.lock() {
            Ok(mut pending) => *pending = Some(data),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Autosave state poisoned, change not recorded");
                return;
            }
        }

        let pending = Arc::clone(&self.pending);
        let storage = self.storage.clone();
        let time = self.time.clone();
        let key = self.key.clone();

        self.save_task.schedule(self.config.debounce, move || {
            with_pending(&pending, |slot| {
                if let Some(payload) = slot.take() {
                    persist_draft(&storage, &time, &key, payload);
                }
            });
        });
    }

    /// Serialize a typed form model and observe it.
    ///
    /// Models that do not serialize to a JSON object are logged and skipped.
    pub fn observe_value<V: Serialize>(&mut self, value: &V) {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => self.observe(map),
            Ok(other) => tracing::warn!(
                key = %self.key,
                kind = json_kind(&other),
                "Draft must serialize to a JSON object, change not recorded"
            ),
            Err(e) => tracing::warn!(key = %self.key, error = %e, "Failed to serialize draft"),
        }
    }

    /// Write any pending change now instead of waiting for the timer.
    pub fn flush(&mut self) {
        self.save_task.cancel();
        with_pending(&self.pending, |slot| {
            if let Some(payload) = slot.take() {
                persist_draft(&self.storage, &self.time, &self.key, payload);
            }
        });
    }

    pub fn has_pending_save(&self) -> bool {
        self.save_task.is_pending()
    }

    /// Delete the stored draft and forget the restorable snapshot.
    ///
    /// Called after the form was submitted, or when the user declines the
    /// restore offer.
    pub fn discard(&mut self) {
        self.save_task.cancel();
        self.restorable = None;

        // A timer callback that already started holds the slot until its
        // write is done, so the removal below always lands after it.
        with_pending(&self.pending, |slot| {
            *slot = None;
            match self.storage.remove(&self.key.storage_key()) {
                Ok(()) => tracing::debug!(key = %self.key, "Draft discarded"),
                Err(e) => tracing::warn!(key = %self.key, error = %e, "Failed to remove draft"),
            }
        });
    }

    /// Invoke the restore callback again with the snapshot loaded by
    /// `initialize`. Returns false when there is nothing to restore.
    pub fn restore_now(&mut self) -> bool {
        match (&self.restorable, self.on_restore.as_mut()) {
            (Some(snapshot), Some(callback)) => {
                callback(snapshot);
                true
            }
            _ => false,
        }
    }

    /// The snapshot loaded by `initialize`, if one is still restorable.
    pub fn restorable(&self) -> Option<&DraftSnapshot> {
        self.restorable.as_ref()
    }

    /// Read what is currently persisted, e.g. for a "saved at" indicator.
    pub fn stored_snapshot(&self) -> Option<DraftSnapshot> {
        self.load_snapshot()
    }

    fn load_snapshot(&self) -> Option<DraftSnapshot> {
        let raw = match self.storage.load(&self.key.storage_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read draft");
                return None;
            }
        };

        match DraftSnapshot::from_stored_json(self.key.clone(), &raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Ignoring unreadable draft");
                None
            }
        }
    }
}

/// Run `f` with the pending slot locked. Storage writes and removals happen
/// inside `f` so they are ordered by the lock.
fn with_pending<F>(pending: &Mutex<Option<DraftPayload>>, f: F)
where
    F: FnOnce(&mut Option<DraftPayload>),
{
    match pending.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(e) => tracing::warn!(error = %e, "Autosave state poisoned"),
    }
}

fn persist_draft<S: StorageProvider, T: TimeProvider>(
    storage: &S,
    time: &T,
    key: &DraftKey,
    payload: DraftPayload,
) {
    let saved_at = i64::try_from(time.now_millis())
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    let snapshot = DraftSnapshot::new(key.clone(), payload, saved_at);

    let raw = match snapshot.to_stored_json() {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to serialize draft");
            return;
        }
    };

    match storage.save(&key.storage_key(), &raw) {
        Ok(()) => tracing::debug!(key = %key, saved_at = %saved_at, "Draft saved"),
        Err(e) => tracing::warn!(key = %key, error = %e, "Failed to save draft"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
