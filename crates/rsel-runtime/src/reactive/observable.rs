#![forbid(unsafe_code)]

//! Version-tracked observable value.
//!
//! The request controller publishes its current answer through an
//! [`Observable`]; the rendering layer either subscribes or dirty-checks
//! [`Observable::version`] once per frame.
//!
//! # Invariants
//!
//! 1. `version` grows by exactly one per value-changing write.
//! 2. Writing a value equal to the current one changes nothing and notifies
//!    nobody.
//! 3. Subscribers run in registration order, outside the interior borrow, so
//!    they may read (but not write) the observable.
//! 4. A dropped [`Subscription`] is never called again; its slot is pruned
//!    on the next notification.
//!
//! # Failure Modes
//!
//! Writing to the observable from inside one of its own subscribers recurses
//! into a nested notification round. Subscribers should only read.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;
type WeakCallback<T> = Weak<dyn Fn(&T)>;

struct Shared<T> {
    value: T,
    version: u64,
    subscribers: Vec<WeakCallback<T>>,
}

/// Shared value handle. Clones point at the same value and subscriber list.
pub struct Observable<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("Observable")
            .field("value", &shared.value)
            .field("version", &shared.version)
            .field("subscribers", &shared.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Wrap `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.borrow().value)
    }

    /// Write `value`; notifies when it differs from the current one.
    /// Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut shared = self.shared.borrow_mut();
            if shared.value == value {
                return false;
            }
            shared.value = value;
            shared.version += 1;
        }
        self.notify();
        true
    }

    /// Mutate in place; notifies when the result differs from before.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let changed = {
            let mut shared = self.shared.borrow_mut();
            let before = shared.value.clone();
            f(&mut shared.value);
            let changed = shared.value != before;
            if changed {
                shared.version += 1;
            }
            changed
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Run `callback` on every change until the returned guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: Callback<T> = Rc::new(callback);
        self.shared
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Monotonic change counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.borrow().version
    }

    /// Whether the value changed after `version` was observed.
    #[must_use]
    pub fn changed_since(&self, version: u64) -> bool {
        self.version() != version
    }

    /// Registered subscriber slots, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.borrow().subscribers.len()
    }

    fn notify(&self) {
        let live: Vec<Callback<T>> = {
            let mut shared = self.shared.borrow_mut();
            shared.subscribers.retain(|w| w.strong_count() > 0);
            shared.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        let value = self.get();
        for callback in &live {
            callback(&value);
        }
    }
}

/// Keeps a subscriber alive; dropping it unsubscribes.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    enum Status {
        Idle,
        Loading(&'static str),
        Loaded(usize),
    }

    #[test]
    fn set_bumps_version_only_on_change() {
        let status = Observable::new(Status::Idle);
        assert!(status.set(Status::Loading("mar")));
        assert!(!status.set(Status::Loading("mar")));
        assert_eq!(status.version(), 1);
        assert_eq!(status.get(), Status::Loading("mar"));
    }

    #[test]
    fn subscribers_see_each_transition_in_order() {
        let status = Observable::new(Status::Idle);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = status.subscribe(move |s| sink.borrow_mut().push(s.clone()));

        status.set(Status::Loading("p"));
        status.set(Status::Loaded(3));
        status.set(Status::Loaded(3));

        assert_eq!(
            *seen.borrow(),
            vec![Status::Loading("p"), Status::Loaded(3)]
        );
    }

    #[test]
    fn registration_order_is_notification_order() {
        let obs = Observable::new(0u8);
        let log = Rc::new(RefCell::new(String::new()));
        let a = Rc::clone(&log);
        let b = Rc::clone(&log);
        let _sa = obs.subscribe(move |_| a.borrow_mut().push('a'));
        let _sb = obs.subscribe(move |_| b.borrow_mut().push('b'));
        obs.set(1);
        assert_eq!(log.borrow().as_str(), "ab");
    }

    #[test]
    fn dropped_subscription_is_silenced_and_pruned() {
        let obs = Observable::new(0u32);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| h.set(h.get() + 1));
        let _keep = obs.subscribe(|_| {});

        obs.set(1);
        drop(sub);
        assert_eq!(obs.subscriber_count(), 2);
        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn update_in_place() {
        let rows = Observable::new(vec!["Ptuj".to_string()]);
        assert!(rows.update(|r| r.push("Maribor".into())));
        assert!(!rows.update(|r| r.sort_by(|a, b| b.cmp(a))));
        assert_eq!(rows.version(), 1);
        assert_eq!(rows.with(Vec::len), 2);
    }

    #[test]
    fn clones_share_value_and_version() {
        let a = Observable::new(Status::Idle);
        let b = a.clone();
        b.set(Status::Loaded(0));
        assert_eq!(a.get(), Status::Loaded(0));
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn changed_since_supports_dirty_checking() {
        let obs = Observable::new(1);
        let seen = obs.version();
        assert!(!obs.changed_since(seen));
        obs.set(2);
        assert!(obs.changed_since(seen));
    }

    #[test]
    fn subscriber_may_read_during_notification() {
        let obs = Observable::new(10);
        let reader = obs.clone();
        let mirrored = Rc::new(Cell::new(0));
        let m = Rc::clone(&mirrored);
        let _sub = obs.subscribe(move |_| m.set(reader.get()));
        obs.set(11);
        assert_eq!(mirrored.get(), 11);
    }

    #[test]
    fn debug_output_names_fields() {
        let dbg = format!("{:?}", Observable::new(7));
        assert!(dbg.contains("version"));
        assert!(dbg.contains('7'));
    }
}
