//! Callback Registry: multi-subscriber dispatch for one
//! signal, with a recursion guard and error-triggered unsubscription.
//!
//! Grounded in original_source/callback_manager.py's `CallbackManager`: an
//! `_active_signals` set doubles as the recursion guard, and a per-source
//! failure counter removes a registration once it reaches the threshold.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::signal::names::Signal;

/// Number of consecutive failures after which a registration is dropped.
const FAILURE_THRESHOLD: u32 = 3;

/// A subscriber invoked as `(signal, new_value, old_value)`, the
/// canonical argument order, overriding the one inconsistent call site in
/// the original source.
pub type Watcher = Box<dyn FnMut(Signal, bool, bool) -> Result<(), String> + Send>;

struct Registration {
    source: &'static str,
    watcher: Watcher,
    failure_count: u32,
}

/// Per-signal watcher lists plus the recursion guard.
#[derive(Default)]
pub struct CallbackRegistry {
    registrations: HashMap<Signal, Vec<Registration>>,
    active: std::collections::HashSet<Signal>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a watcher for `signal`. Registrations are kept in
    /// append order, which is also dispatch order.
    pub fn register(&mut self, signal: Signal, source: &'static str, watcher: Watcher) {
        self.registrations
            .entry(signal)
            .or_default()
            .push(Registration {
                source,
                watcher,
                failure_count: 0,
            });
    }

    /// Removes every watcher registered from `source` for `signal`.
    pub fn remove(&mut self, signal: Signal, source: &'static str) {
        if let Some(regs) = self.registrations.get_mut(&signal) {
            regs.retain(|r| r.source != source);
        }
    }

    #[cfg(test)]
    pub fn count(&self, signal: Signal) -> usize {
        self.registrations.get(&signal).map_or(0, Vec::len)
    }

    /// Dispatches `(signal, new, old)` to every live watcher for `signal`.
    ///
    /// Obeys three rules: a recursive notification
    /// for a signal already being dispatched is dropped and warned about;
    /// a failing watcher does not abort the iteration, and is dropped once
    /// its failure count reaches [`FAILURE_THRESHOLD`]; the active-signal
    /// mark is always cleared on return.
    pub fn notify(&mut self, signal: Signal, new: bool, old: bool) {
        if self.active.contains(&signal) {
            tracing::warn!(%signal, "recursive callback notification dropped");
            return;
        }
        self.active.insert(signal);

        if let Some(regs) = self.registrations.get_mut(&signal) {
            let mut dead = Vec::new();
            for (idx, reg) in regs.iter_mut().enumerate() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| (reg.watcher)(signal, new, old)));
                let fault = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(detail)) => Some(detail),
                    Err(_) => Some("watcher panicked".to_string()),
                };
                if let Some(detail) = fault {
                    reg.failure_count += 1;
                    tracing::error!(
                        %signal,
                        source = reg.source,
                        failure_count = reg.failure_count,
                        %detail,
                        "watcher fault"
                    );
                    if reg.failure_count >= FAILURE_THRESHOLD {
                        tracing::warn!(%signal, source = reg.source, "removing watcher after repeated failures");
                        dead.push(idx);
                    }
                }
            }
            for idx in dead.into_iter().rev() {
                regs.remove(idx);
            }
        }

        self.active.remove(&signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::names::Signal;

    #[test]
    fn drops_watcher_after_third_failure() {
        let mut registry = CallbackRegistry::new();
        registry.register(
            Signal::Ready,
            "test",
            Box::new(|_, _, _| Err("boom".to_string())),
        );
        assert_eq!(registry.count(Signal::Ready), 1);

        registry.notify(Signal::Ready, true, false);
        assert_eq!(registry.count(Signal::Ready), 1);
        registry.notify(Signal::Ready, true, false);
        assert_eq!(registry.count(Signal::Ready), 1);
        registry.notify(Signal::Ready, true, false);
        assert_eq!(registry.count(Signal::Ready), 0, "removed after 3rd failure");
    }

    #[test]
    fn recursive_notification_is_dropped() {
        let mut registry = CallbackRegistry::new();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen2 = seen.clone();
        // A watcher that would recurse by notifying its own signal again:
        // the registry itself enforces the guard, so we simulate the
        // "currently dispatching" state directly.
        registry.register(
            Signal::Ready,
            "test",
            Box::new(move |_, _, _| {
                seen2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }),
        );
        registry.active.insert(Signal::Ready);
        registry.notify(Signal::Ready, true, false);
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_watcher_is_retained() {
        let mut registry = CallbackRegistry::new();
        registry.register(Signal::Valid, "test", Box::new(|_, _, _| Ok(())));
        for _ in 0..10 {
            registry.notify(Signal::Valid, true, false);
        }
        assert_eq!(registry.count(Signal::Valid), 1);
    }
}
