//! Subscription state management

use std::time::Instant;

/// Subscription state machine
///
/// A subscription binds to at most one source at a time. Rebinding goes
/// through `Unsubscribed`, a failed subscribe behaves like `Unsubscribed` and
/// can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not bound to any source, no frames are delivered
    Unsubscribed,

    /// Bound to a source and publishing its frames
    Subscribed {
        /// When the source accepted the subscription
        since: Instant,
    },

    /// The last subscribe attempt was rejected or the sink was gone
    SubscriptionFailed,
}

impl SubscriptionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &SubscriptionState) -> bool {
        use SubscriptionState::*;

        match (self, target) {
            // From Unsubscribed
            (Unsubscribed, Subscribed { .. }) => true,
            (Unsubscribed, SubscriptionFailed) => true,

            // From Subscribed, a new binding always unsubscribes first
            (Subscribed { .. }, Unsubscribed) => true,
            (Subscribed { .. }, SubscriptionFailed) => true,

            // From SubscriptionFailed, retry or reset
            (SubscriptionFailed, Subscribed { .. }) => true,
            (SubscriptionFailed, Unsubscribed) => true,

            // Self-transitions
            (a, b) if a == b => true,

            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            SubscriptionState::Unsubscribed => "Unsubscribed",
            SubscriptionState::Subscribed { .. } => "Subscribed",
            SubscriptionState::SubscriptionFailed => "SubscriptionFailed",
        }
    }

    /// Check if frames from the source are being published
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriptionState::Subscribed { .. })
    }

    /// Check if the last subscribe attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, SubscriptionState::SubscriptionFailed)
    }

    /// Get the duration since the source accepted the subscription
    pub fn subscribed_duration(&self) -> Option<std::time::Duration> {
        if let SubscriptionState::Subscribed { since } = self {
            Some(since.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
