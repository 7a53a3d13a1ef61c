//! Signal Bus: the fixed signal table plus watcher
//! dispatch (delegated to [`CallbackRegistry`]).
//!
//! Callers share one bus behind a single `parking_lot::Mutex` (the
//! controller and the I/O Bridge worker each hold an
//! `Arc<Mutex<SignalBus>>`), so a `set` call holds the lock for its full
//! duration including watcher fan-out. That is what keeps the edge and
//! its notification atomic, rather than any locking inside `SignalBus`
//! itself.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::signal::callback::{CallbackRegistry, Watcher};
use crate::signal::names::Signal;

pub struct SignalBus {
    table: HashMap<Signal, bool>,
    callbacks: CallbackRegistry,
}

impl Default for SignalBus {
    fn default() -> Self {
        let table = Signal::ALL
            .iter()
            .map(|&s| (s, s.default_value()))
            .collect();
        Self {
            table,
            callbacks: CallbackRegistry::new(),
        }
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current value of `signal`. Signals are a closed
    /// enumeration, so this cannot fail for any value constructible from
    /// the enum itself; the fallible variant exists for the config-time
    /// string lookup boundary.
    pub fn get(&self, signal: Signal) -> bool {
        self.table[&signal]
    }

    /// Name-based lookup used when a signal name arrives as text (pin-map
    /// loading, diagnostics). Fails with [`Error::UnknownSignal`] for any
    /// name outside the fixed universe.
    pub fn get_named(&self, name: &str) -> Result<bool> {
        let signal: Signal = name
            .parse()
            .map_err(|_| Error::UnknownSignal(name.to_string()))?;
        Ok(self.get(signal))
    }

    /// Writes `value` to `signal`. A no-op if the value is unchanged;
    /// otherwise stores it, logs the edge, and fans it out to watchers in
    /// registration order.
    pub fn set(&mut self, signal: Signal, value: bool) {
        let old = self.table[&signal];
        if old == value {
            return;
        }
        self.table.insert(signal, value);
        tracing::info!(%signal, old, new = value, "signal changed");
        self.callbacks.notify(signal, value, old);
    }

    /// Registers a watcher invoked as `(signal, new, old)` on every edge
    /// of `signal`. `source` identifies the registration for removal and
    /// diagnostics.
    pub fn watch(&mut self, signal: Signal, source: &'static str, watcher: Watcher) {
        self.callbacks.register(signal, source, watcher);
    }

    pub fn unwatch(&mut self, signal: Signal, source: &'static str) {
        self.callbacks.remove(signal, source);
    }

    /// A consistent read of every signal, in [`Signal::ALL`] order.
    pub fn snapshot(&self) -> Vec<(Signal, bool)> {
        Signal::ALL.iter().map(|&s| (s, self.table[&s])).collect()
    }

    /// Writes every signal back to its default value through `set`,
    /// firing watchers normally.
    pub fn reset_all(&mut self) {
        for signal in Signal::ALL {
            self.set(signal, signal.default_value());
        }
    }

    /// Writes only the five passive outputs back to their defaults.
    pub fn reset_passive(&mut self) {
        for signal in Signal::ALL.into_iter().filter(|s| s.is_passive()) {
            self.set(signal, signal.default_value());
        }
    }
}
