//! Feeding updates into the event bus.
//!
//! [`UpdateDriver`] turns each [`Update`] into bus dispatches and is the one
//! place where a failing handler is caught. What happens next is up to the
//! [`FailurePolicy`].

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use parley_core::{EventName, Payload, Update};
use parley_framework::{DispatchError, DispatchResult, EventBus};

use crate::config::PolicyKind;

/// Returns the payload an update is dispatched under, if it carries one.
///
/// The first populated field wins, in the order message, edited message,
/// inline query, chosen inline result, callback query.
pub fn classify(update: &Update) -> Option<Payload<'_>> {
    if let Some(message) = &update.message {
        Some(Payload::Message(message))
    } else if let Some(message) = &update.edited_message {
        Some(Payload::EditedMessage(message))
    } else if let Some(query) = &update.inline_query {
        Some(Payload::InlineQuery(query))
    } else if let Some(result) = &update.chosen_inline_result {
        Some(Payload::ChosenInlineResult(result))
    } else {
        update.callback_query.as_ref().map(Payload::CallbackQuery)
    }
}

/// What the driver does after a failed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Go on with the next update.
    Continue,
    /// Drop the rest of the batch and halt.
    Stop,
}

type Decide = Arc<dyn Fn(&Update, &DispatchError) -> PolicyDecision + Send + Sync>;

/// Decides whether processing survives a failed update.
#[derive(Clone)]
pub struct FailurePolicy {
    name: &'static str,
    decide: Decide,
}

impl FailurePolicy {
    /// Creates a policy from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Update, &DispatchError) -> PolicyDecision + Send + Sync + 'static,
    {
        Self {
            name: "custom",
            decide: Arc::new(f),
        }
    }

    /// Logs the failure and halts.
    pub fn stopping() -> Self {
        Self {
            name: "stopping",
            decide: Arc::new(|update, err| {
                error!(%update, error = %err, "Handler failed, stopping");
                PolicyDecision::Stop
            }),
        }
    }

    /// Logs the failure and moves on.
    pub fn continuing() -> Self {
        Self {
            name: "continuing",
            decide: Arc::new(|update, err| {
                error!(%update, error = %err, "Handler failed");
                PolicyDecision::Continue
            }),
        }
    }

    /// Applies the policy to a failure.
    pub fn decide(&self, update: &Update, err: &DispatchError) -> PolicyDecision {
        (self.decide)(update, err)
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::stopping()
    }
}

impl From<PolicyKind> for FailurePolicy {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Stop => Self::stopping(),
            PolicyKind::Continue => Self::continuing(),
        }
    }
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailurePolicy")
            .field("name", &self.name)
            .finish()
    }
}

/// The outcome of processing one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Updates that were dispatched, including failed ones.
    pub processed: usize,
    /// Updates some listener claimed.
    pub claimed: usize,
    /// Updates whose dispatch failed.
    pub failed: usize,
    /// Whether the policy stopped the batch early.
    pub halted: bool,
    /// Highest update id that was fully processed. The update that halted
    /// the batch does not count.
    pub last_processed: Option<i64>,
}

impl BatchReport {
    fn complete(&mut self, update_id: i64) {
        self.last_processed = Some(self.last_processed.map_or(update_id, |id| id.max(update_id)));
    }
}

/// Dispatches updates to an [`EventBus`].
#[derive(Debug, Clone, Default)]
pub struct UpdateDriver {
    bus: EventBus,
    policy: FailurePolicy,
}

impl UpdateDriver {
    /// Creates a driver with the stopping policy.
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            policy: FailurePolicy::default(),
        }
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the bus updates are dispatched to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the failure policy.
    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Dispatches one update.
    ///
    /// The raw update goes out under [`EventName::Update`] first, then the
    /// classified payload under its own event. Returns whether the
    /// classified payload was claimed.
    pub async fn process_update(&self, update: &Update) -> DispatchResult<bool> {
        debug!(%update, "Processing update");

        self.bus
            .dispatch(EventName::Update, Payload::Update(update))
            .await?;

        match classify(update) {
            Some(payload) => self.bus.dispatch(payload.event_name(), payload).await,
            None => {
                debug!(%update, "Update carries no known payload");
                Ok(false)
            }
        }
    }

    /// Dispatches a batch in order, consulting the policy on failures.
    ///
    /// Updates are pulled one at a time, so nothing is taken from `updates`
    /// after the policy halts the batch.
    pub async fn process_updates<I>(&self, updates: I) -> BatchReport
    where
        I: IntoIterator,
        I::Item: Borrow<Update>,
    {
        let mut report = BatchReport::default();

        for update in updates {
            let update = update.borrow();
            report.processed += 1;
            match self.process_update(update).await {
                Ok(claimed) => {
                    if claimed {
                        report.claimed += 1;
                    }
                    report.complete(update.update_id);
                }
                Err(err) => {
                    report.failed += 1;
                    if self.policy.decide(update, &err) == PolicyDecision::Stop {
                        report.halted = true;
                        break;
                    }
                    report.complete(update.update_id);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use parley_core::{CallbackQuery, Message, User};
    use parley_framework::{DispatchError, listener_fn};

    use super::*;

    /// Records each message's text and fails on "boom".
    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<String>>>) {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.append(EventName::Message, FailOnBoom(seen.clone()));
        (bus, seen)
    }

    struct FailOnBoom(Arc<Mutex<Vec<String>>>);

    #[async_trait::async_trait]
    impl parley_framework::Listener for FailOnBoom {
        async fn call(&self, _bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool> {
            let text = payload.text().unwrap_or_default().to_string();
            self.0.lock().push(text.clone());
            if text == "boom" {
                return Err(DispatchError::listener("fail_on_boom", anyhow::anyhow!("boom")));
            }
            Ok(true)
        }
    }

    fn batch() -> Vec<Update> {
        vec![
            Update::message(1, Message::text_in(1, "one")),
            Update::message(2, Message::text_in(1, "boom")),
            Update::message(3, Message::text_in(1, "three")),
        ]
    }

    #[tokio::test]
    async fn test_stopping_policy_halts_batch() {
        let (bus, seen) = recording_bus();
        let driver = UpdateDriver::new(bus);

        let report = driver.process_updates(&batch()).await;

        assert_eq!(*seen.lock(), vec!["one", "boom"]);
        assert!(report.halted);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.last_processed, Some(1));
    }

    #[tokio::test]
    async fn test_halted_batch_stops_pulling_updates() {
        let (bus, seen) = recording_bus();
        let driver = UpdateDriver::new(bus);
        let pulled = AtomicUsize::new(0);

        let updates = batch().into_iter().inspect(|_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });
        let report = driver.process_updates(updates).await;

        assert!(report.halted);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock(), vec!["one", "boom"]);
    }

    #[tokio::test]
    async fn test_continuing_policy_processes_rest() {
        let (bus, seen) = recording_bus();
        let driver = UpdateDriver::new(bus).with_policy(FailurePolicy::continuing());

        let report = driver.process_updates(&batch()).await;

        assert_eq!(*seen.lock(), vec!["one", "boom", "three"]);
        assert!(!report.halted);
        assert_eq!(report.claimed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.last_processed, Some(3));
    }

    #[tokio::test]
    async fn test_update_dispatched_before_payload() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for event in [EventName::Update, EventName::CallbackQuery] {
            let order = order.clone();
            bus.append(
                event,
                listener_fn("record", move |payload| {
                    order.lock().push(payload.event_name());
                    true
                }),
            );
        }

        let update = Update::callback_query(7, CallbackQuery::new("q", User::new(1, "a"), "ok"));
        let claimed = UpdateDriver::new(bus).process_update(&update).await.unwrap();

        assert!(claimed);
        assert_eq!(
            *order.lock(),
            vec![EventName::Update, EventName::CallbackQuery]
        );
    }

    #[test]
    fn test_classify_prefers_message() {
        let mut update = Update::message(1, Message::text_in(1, "new"));
        update.edited_message = Some(Message::text_in(1, "old"));

        assert!(matches!(classify(&update), Some(Payload::Message(_))));

        update.message = None;
        assert!(matches!(classify(&update), Some(Payload::EditedMessage(_))));

        update.edited_message = None;
        assert!(classify(&update).is_none());
    }

    #[test]
    fn test_policy_from_kind() {
        let err = DispatchError::listener("l", anyhow::anyhow!("x"));
        let update = Update::message(1, Message::text_in(1, "x"));

        assert_eq!(
            FailurePolicy::from(PolicyKind::Continue).decide(&update, &err),
            PolicyDecision::Continue
        );
        assert_eq!(
            FailurePolicy::default().decide(&update, &err),
            PolicyDecision::Stop
        );
    }
}
