//! Subscription hub: ordered fan-out of state snapshots.
//!
//! Two channels, one for the confirmed (source) state and one for the
//! optimistic state. Subscribers run synchronously in registration order and
//! receive the committed snapshot, which they may keep.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// A registered observer of state snapshots.
pub type Subscriber<S> = Box<dyn Fn(&Arc<S>) + Send + Sync>;

/// Which state a subscriber observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Confirmed,
    Optimistic,
}

/// Register-only subscriber lists for both channels.
pub struct SubscriptionHub<S> {
    confirmed: SmallVec<[Subscriber<S>; 2]>,
    optimistic: SmallVec<[Subscriber<S>; 2]>,
}

impl<S> SubscriptionHub<S> {
    pub fn new() -> Self {
        Self {
            confirmed: SmallVec::new(),
            optimistic: SmallVec::new(),
        }
    }

    pub fn on_confirmed_change<F>(&mut self, subscriber: F)
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.confirmed.push(Box::new(subscriber));
    }

    pub fn on_optimistic_change<F>(&mut self, subscriber: F)
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.optimistic.push(Box::new(subscriber));
    }

    /// Deliver `state` to every subscriber on `channel`, in order.
    pub fn notify(&self, channel: Channel, state: &Arc<S>) {
        let subscribers = match channel {
            Channel::Confirmed => &self.confirmed,
            Channel::Optimistic => &self.optimistic,
        };
        for subscriber in subscribers {
            subscriber(state);
        }
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Confirmed => self.confirmed.len(),
            Channel::Optimistic => self.optimistic.len(),
        }
    }
}

impl<S> Default for SubscriptionHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SubscriptionHub<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("confirmed", &self.confirmed.len())
            .field("optimistic", &self.optimistic.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hub = SubscriptionHub::<i32>::new();

        for name in ["first", "second", "third"] {
            let log = log.clone();
            hub.on_confirmed_change(move |state| log.lock().unwrap().push((name, **state)));
        }

        hub.notify(Channel::Confirmed, &Arc::new(7));
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_channels_are_independent() {
        let confirmed = Arc::new(Mutex::new(0));
        let optimistic = Arc::new(Mutex::new(0));
        let mut hub = SubscriptionHub::<i32>::new();
        {
            let confirmed = confirmed.clone();
            hub.on_confirmed_change(move |_| *confirmed.lock().unwrap() += 1);
        }
        {
            let optimistic = optimistic.clone();
            hub.on_optimistic_change(move |_| *optimistic.lock().unwrap() += 1);
        }

        hub.notify(Channel::Optimistic, &Arc::new(1));
        hub.notify(Channel::Optimistic, &Arc::new(2));

        assert_eq!(*confirmed.lock().unwrap(), 0);
        assert_eq!(*optimistic.lock().unwrap(), 2);
        assert_eq!(hub.subscriber_count(Channel::Confirmed), 1);
        assert_eq!(hub.subscriber_count(Channel::Optimistic), 1);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let hub = SubscriptionHub::<i32>::default();
        hub.notify(Channel::Confirmed, &Arc::new(0));
    }
}
