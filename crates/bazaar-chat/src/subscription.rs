use crate::{
    ConnectionState, InsertFilter, Liveness, PushSource, RealtimeReconciler, Result,
    SubscriptionHandle,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

struct ActiveSubscription {
    user_id: String,
    handle: SubscriptionHandle,
    liveness: Liveness,
    task: JoinHandle<()>,
}

/// Owns the single push subscription of a signed-in Messages view session.
pub struct SubscriptionLifecycle {
    push: Arc<dyn PushSource>,
    reconciler: Arc<RealtimeReconciler>,
    active: Option<ActiveSubscription>,
}

impl SubscriptionLifecycle {
    pub fn new(push: Arc<dyn PushSource>, reconciler: Arc<RealtimeReconciler>) -> Self {
        Self {
            push,
            reconciler,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_user(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.user_id.as_str())
    }

    /// Subscribes to every message insert for `user_id`. Idempotent for the
    /// same user; a different user replaces the current subscription. Must
    /// be called from within a tokio runtime.
    pub fn activate(&mut self, user_id: &str) -> Result<()> {
        if self.active_user() == Some(user_id) {
            return Ok(());
        }
        self.teardown();

        self.reconciler
            .set_connection_state(ConnectionState::Connecting);
        let subscription = match self.push.subscribe(InsertFilter::messages()) {
            Ok(subscription) => subscription,
            Err(e) => {
                self.reconciler
                    .set_connection_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let handle = subscription.handle();
        let liveness = Liveness::new();
        let task = tokio::spawn(
            self.reconciler
                .clone()
                .run(subscription, liveness.clone()),
        );

        info!(user = user_id, subscription = %handle.id(), "messages subscription created");
        self.active = Some(ActiveSubscription {
            user_id: user_id.to_string(),
            handle,
            liveness,
            task,
        });
        Ok(())
    }

    /// Releases the subscription. The liveness flag flips before anything
    /// else so in-flight notifications are dropped.
    pub fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.liveness.revoke();
        active.handle.unsubscribe();
        active.task.abort();
        self.reconciler.refresher().cancel();
        self.reconciler
            .set_connection_state(ConnectionState::Disconnected);
        info!(user = %active.user_id, "messages subscription released");
    }
}

impl Drop for SubscriptionLifecycle {
    fn drop(&mut self) {
        self.teardown();
    }
}
