// ── Subscriber registry ──
//
// Ordered fan-out of alert, resolution and connection-state notifications
// to independently registered handlers. Every handler call runs inside
// its own unwind boundary so one failing consumer cannot starve the
// ones registered after it, nor take down the connection task.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use pondwatch_api::{AlertEvent, AlertResolution};

use crate::client::ConnectionState;

type HandlerFn<T> = dyn Fn(&T) + Send + Sync;

// ── Subscription ─────────────────────────────────────────────────────

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Handle returned by every registration.
///
/// Dropping it does *not* unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe), which may be called any number of
/// times and from inside the handler itself.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    list: Weak<dyn Detach>,
}

impl Subscription {
    /// Whether the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the handler. Later notifications will not reach it.
    pub fn unsubscribe(&self) {
        if let Some(list) = self.list.upgrade() {
            list.detach(self.id);
        }
        self.active.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ── HandlerList ──────────────────────────────────────────────────────

struct Entry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Box<HandlerFn<T>>,
}

/// Registration-ordered handlers for one notification class.
struct HandlerList<T> {
    kind: &'static str,
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry<T>>>>,
}

impl<T: 'static> HandlerList<T> {
    fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        })
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Entry<T>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(self: &Arc<Self>, handler: Box<HandlerFn<T>>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.entries().push(Arc::new(Entry {
            id,
            active: Arc::clone(&active),
            handler,
        }));

        let list: Arc<dyn Detach> = self.clone();
        Subscription {
            id,
            active,
            list: Arc::downgrade(&list),
        }
    }

    fn clear(&self) {
        for entry in self.entries().drain(..) {
            entry.active.store(false, Ordering::Release);
        }
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    /// Call every active handler in registration order. The list lock is
    /// not held while a handler runs.
    fn deliver(&self, value: &T) {
        let snapshot: Vec<Arc<Entry<T>>> = self.entries().clone();
        for entry in snapshot {
            // Unsubscribed by an earlier handler during this same delivery.
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(value)));
            if let Err(payload) = outcome {
                tracing::error!(
                    kind = self.kind,
                    subscription = entry.id,
                    panic = panic_message(payload.as_ref()),
                    "Subscriber panicked, continuing delivery"
                );
            }
        }
    }
}

impl<T: 'static> Detach for HandlerList<T> {
    fn detach(&self, id: u64) {
        self.entries().retain(|entry| {
            if entry.id == id {
                entry.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ── Notification ─────────────────────────────────────────────────────

/// One item queued for fan-out.
#[derive(Debug, Clone)]
pub(crate) enum Notification {
    State(ConnectionState),
    Alert(AlertEvent),
    Resolved(AlertResolution),
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<Notification>,
    /// Thread currently delivering, if any.
    drainer: Option<ThreadId>,
}

// ── SubscriberRegistry ───────────────────────────────────────────────

/// Fan-out hub for everything the alert stream produces.
///
/// Notifications are queued in the order they happen and drained by one
/// thread at a time. A handler that triggers a new notification (say, by
/// calling `stop()` from a state handler) has it delivered right after it
/// returns, never re-entrantly and never out of order. A caller on another
/// thread blocks until the queue is empty, so once `flush()` returns every
/// notification queued before it has been delivered.
pub struct SubscriberRegistry {
    alerts: Arc<HandlerList<AlertEvent>>,
    resolutions: Arc<HandlerList<AlertResolution>>,
    states: Arc<HandlerList<ConnectionState>>,
    outbox: Mutex<Outbox>,
    idle: Condvar,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            alerts: HandlerList::new("alert"),
            resolutions: HandlerList::new("alert-resolved"),
            states: HandlerList::new("state"),
            outbox: Mutex::new(Outbox::default()),
            idle: Condvar::new(),
        }
    }

    pub fn on_alert(&self, handler: impl Fn(&AlertEvent) + Send + Sync + 'static) -> Subscription {
        self.alerts.register(Box::new(handler))
    }

    pub fn on_alert_resolved(
        &self,
        handler: impl Fn(&AlertResolution) + Send + Sync + 'static,
    ) -> Subscription {
        self.resolutions.register(Box::new(handler))
    }

    pub fn on_state_change(
        &self,
        handler: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.states.register(Box::new(handler))
    }

    /// Drop every alert and resolution handler. State handlers stay.
    pub fn clear_alert_handlers(&self) {
        self.alerts.clear();
        self.resolutions.clear();
    }

    pub fn alert_handler_count(&self) -> usize {
        self.alerts.len() + self.resolutions.len()
    }

    pub fn state_handler_count(&self) -> usize {
        self.states.len()
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a notification without delivering it.
    pub(crate) fn enqueue(&self, notification: Notification) {
        self.outbox().pending.push_back(notification);
    }

    /// Deliver everything queued.
    ///
    /// Returns immediately when called from inside a handler on the
    /// draining thread; the outer loop picks the new items up. From any
    /// other thread, waits for the current drainer to finish first.
    pub(crate) fn flush(&self) {
        let me = thread::current().id();
        {
            let mut outbox = self.outbox();
            loop {
                let drainer = outbox.drainer;
                match drainer {
                    Some(id) if id == me => return,
                    Some(_) => {
                        outbox = self
                            .idle
                            .wait(outbox)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    None => break,
                }
            }
            if outbox.pending.is_empty() {
                return;
            }
            outbox.drainer = Some(me);
        }

        loop {
            let next = {
                let mut outbox = self.outbox();
                if let Some(next) = outbox.pending.pop_front() {
                    next
                } else {
                    outbox.drainer = None;
                    self.idle.notify_all();
                    return;
                }
            };
            self.deliver(&next);
        }
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, notification: Notification) {
        self.enqueue(notification);
        self.flush();
    }

    fn deliver(&self, notification: &Notification) {
        match notification {
            Notification::State(state) => self.states.deliver(state),
            Notification::Alert(alert) => self.alerts.deliver(alert),
            Notification::Resolved(resolution) => self.resolutions.deliver(resolution),
        }
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("alerts", &self.alerts.len())
            .field("resolutions", &self.resolutions.len())
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pondwatch_api::{AlertKind, ResourceId, Severity, WaterParameter};

    use super::*;

    fn alert(id: i64) -> AlertEvent {
        AlertEvent {
            id: ResourceId::Numeric(id),
            pond_id: ResourceId::Numeric(3),
            pond_name: Some("Grow-out 1".into()),
            parameter_name: WaterParameter::Ammonia,
            measured_value: 0.8,
            kind: AlertKind::High,
            severity: Severity::High,
            message: "Ammonia above 0.5 mg/L".into(),
            created_at: chrono_now(),
            is_resolved: false,
            resolved_by_user_id: None,
            resolved_by_user_name: None,
        }
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        serde_json::from_str("\"2025-06-14T04:12:09Z\"").unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let log = Arc::clone(&log);
            move |line: &str| log.lock().unwrap().push(line.to_owned())
        };
        (log, sink)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        let r1 = record.clone();
        registry.on_alert(move |a| r1(&format!("first:{}", a.id)));
        let r2 = record.clone();
        registry.on_alert(move |a| r2(&format!("second:{}", a.id)));

        registry.publish(Notification::Alert(alert(7)));

        assert_eq!(*log.lock().unwrap(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn unsubscribed_handler_is_skipped() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        let r1 = record.clone();
        let first = registry.on_alert(move |_| r1("first"));
        let r2 = record.clone();
        registry.on_alert(move |_| r2("second"));

        first.unsubscribe();
        first.unsubscribe();
        registry.publish(Notification::Alert(alert(1)));

        assert_eq!(*log.lock().unwrap(), vec!["second"]);
        assert!(!first.is_active());
        assert_eq!(registry.alert_handler_count(), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_later_handlers() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        registry.on_state_change(|_| panic!("toast renderer exploded"));
        let r = record.clone();
        registry.on_state_change(move |s| r(&s.to_string()));

        registry.publish(Notification::State(ConnectionState::Connected));
        registry.publish(Notification::State(ConnectionState::Reconnecting));

        assert_eq!(*log.lock().unwrap(), vec!["Connected", "Reconnecting"]);
    }

    #[test]
    fn handler_can_unsubscribe_itself() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let r = record.clone();
        let sub = registry.on_alert(move |_| {
            r("once");
            if let Some(sub) = inner.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        registry.publish(Notification::Alert(alert(1)));
        registry.publish(Notification::Alert(alert(2)));

        assert_eq!(*log.lock().unwrap(), vec!["once"]);
    }

    #[test]
    fn handler_unsubscribing_a_later_one_stops_it_for_the_same_event() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        registry.on_alert(move |_| {
            if let Some(sub) = inner.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        let r = record.clone();
        *slot.lock().unwrap() = Some(registry.on_alert(move |_| r("late")));

        registry.publish(Notification::Alert(alert(1)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn reentrant_publish_is_delivered_after_current_handler() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (log, record) = recorder();

        let reg = Arc::clone(&registry);
        let r1 = record.clone();
        registry.on_state_change(move |s| {
            r1(&format!("a:{s}"));
            if *s == ConnectionState::Connected {
                reg.publish(Notification::State(ConnectionState::Disconnected));
            }
        });
        let r2 = record.clone();
        registry.on_state_change(move |s| r2(&format!("b:{s}")));

        registry.publish(Notification::State(ConnectionState::Connected));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:Connected", "b:Connected", "a:Disconnected", "b:Disconnected"]
        );
    }

    #[test]
    fn flush_from_another_thread_waits_for_the_drainer() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (log, record) = recorder();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        let r = record.clone();
        registry.on_state_change(move |s| {
            if *s == ConnectionState::Connected {
                entered_tx.send(()).unwrap();
                thread::sleep(std::time::Duration::from_millis(200));
            }
            r(&s.to_string());
        });

        let reg = Arc::clone(&registry);
        let drainer =
            thread::spawn(move || reg.publish(Notification::State(ConnectionState::Connected)));
        entered_rx.recv().unwrap();

        registry.publish(Notification::State(ConnectionState::Disconnected));
        assert_eq!(*log.lock().unwrap(), vec!["Connected", "Disconnected"]);

        drainer.join().unwrap();
    }

    #[test]
    fn clearing_alert_handlers_keeps_state_handlers() {
        let registry = SubscriberRegistry::new();
        let alert_sub = registry.on_alert(|_| {});
        registry.on_alert_resolved(|_| {});
        registry.on_state_change(|_| {});

        registry.clear_alert_handlers();

        assert_eq!(registry.alert_handler_count(), 0);
        assert_eq!(registry.state_handler_count(), 1);
        assert!(!alert_sub.is_active());
    }

    #[test]
    fn resolutions_reach_resolution_handlers_only() {
        let registry = SubscriberRegistry::new();
        let (log, record) = recorder();

        let r1 = record.clone();
        registry.on_alert(move |_| r1("alert"));
        let r2 = record.clone();
        registry.on_alert_resolved(move |res| r2(&format!("resolved:{}", res.alert_id)));

        registry.publish(Notification::Resolved(AlertResolution {
            alert_id: ResourceId::Numeric(44),
            resolved_by_user_id: None,
            resolved_by_user_name: Some("ops".into()),
            resolved_at: None,
        }));

        assert_eq!(*log.lock().unwrap(), vec!["resolved:44"]);
    }
}
