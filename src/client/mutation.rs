//! Single-flight mutation state
//!
//! A widget owns one [`Mutation`]. While a request is pending further
//! triggers are ignored. Settling applies one rule: the server response
//! replaces the optimistic value, an error reverts to the value held before
//! the trigger. Nothing is retried.

use super::api::ClientError;

/// Where a widget's request stands.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Idle,
    Pending,
    Confirmed,
    Failed(ClientError),
}

/// A value with at most one request in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<T> {
    value: T,
    rollback: Option<T>,
    state: MutationState,
}

impl<T: Clone> Mutation<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            rollback: None,
            state: MutationState::Idle,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, MutationState::Pending)
    }

    /// Start a request, showing `optimistic` until it settles.
    ///
    /// Returns `false` (and changes nothing) when a request is already
    /// pending; the caller must not send anything in that case.
    pub fn begin(&mut self, optimistic: T) -> bool {
        if self.is_pending() {
            return false;
        }
        self.rollback = Some(std::mem::replace(&mut self.value, optimistic));
        self.state = MutationState::Pending;
        true
    }

    /// Start a request without an optimistic value.
    pub fn begin_unchanged(&mut self) -> bool {
        let current = self.value.clone();
        self.begin(current)
    }

    /// Reconcile with the server's answer.
    pub fn settle(&mut self, outcome: Result<T, ClientError>) {
        if !self.is_pending() {
            return;
        }
        match outcome {
            Ok(confirmed) => {
                self.value = confirmed;
                self.rollback = None;
                self.state = MutationState::Confirmed;
            }
            Err(err) => {
                if let Some(previous) = self.rollback.take() {
                    self.value = previous;
                }
                self.state = MutationState::Failed(err);
            }
        }
    }

    /// Inline message for the last failure, if any.
    pub fn error_message(&self) -> Option<String> {
        match &self.state {
            MutationState::Failed(err) => Some(err.user_message()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn confirmed_value_replaces_optimistic() {
        let mut upvotes = Mutation::new(4_i64);
        assert!(upvotes.begin(5));
        assert_eq!(*upvotes.value(), 5);

        upvotes.settle(Ok(7));
        assert_eq!(*upvotes.value(), 7);
        assert_eq!(upvotes.state(), &MutationState::Confirmed);
    }

    #[test]
    fn failure_reverts() {
        let mut upvotes = Mutation::new(4_i64);
        upvotes.begin(5);
        upvotes.settle(Err(ClientError::Conflict("You already upvoted".into())));
        assert_eq!(*upvotes.value(), 4);
        assert_eq!(upvotes.error_message().as_deref(), Some("You already upvoted"));
    }

    #[test]
    fn second_trigger_while_pending_is_ignored() {
        let mut upvotes = Mutation::new(0_i64);
        assert!(upvotes.begin(1));
        assert!(!upvotes.begin(2));
        assert_eq!(*upvotes.value(), 1);

        upvotes.settle(Err(ClientError::Network("offline".into())));
        assert_eq!(*upvotes.value(), 0);

        // Idle again after settling.
        assert!(upvotes.begin(1));
    }

    #[test]
    fn settle_without_begin_is_noop() {
        let mut m = Mutation::new("a".to_string());
        m.settle(Ok("b".to_string()));
        assert_eq!(m.value(), "a");
        assert_eq!(m.state(), &MutationState::Idle);
    }

    proptest! {
        #[test]
        fn failure_always_restores_pre_trigger_value(start in 0_i64..1000, bump in 1_i64..5) {
            let mut m = Mutation::new(start);
            m.begin(start + bump);
            m.settle(Err(ClientError::Api("boom".into())));
            prop_assert_eq!(*m.value(), start);
        }
    }
}
