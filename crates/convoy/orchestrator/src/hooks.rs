//! Lifecycle hook registry.
//!
//! Hooks are typed extension points around deployment milestones. They
//! run under the same timeout contract as external commands, and a
//! failing or timed-out hook is logged and dropped; hooks can observe a
//! deployment but never fail one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Milestones hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Before any work on a domain starts.
    BeforeDomain,

    /// After a domain completed successfully.
    AfterDomain,

    /// Before migrations run for a domain.
    BeforeMigrations,

    /// After migrations finished for a domain.
    AfterMigrations,

    /// After a domain's deployment failed.
    OnFailure,

    /// After a failed domain was rolled back.
    OnRollback,
}

/// A single lifecycle hook.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn on_event(
        &self,
        event: LifecycleEvent,
        domain: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Registry of hooks, keyed by the event they attach to.
pub struct HookRegistry {
    hooks: HashMap<LifecycleEvent, Vec<Arc<dyn LifecycleHook>>>,
    timeout: Duration,
}

impl HookRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hooks: HashMap::new(),
            timeout,
        }
    }

    /// Attach a hook to an event.
    pub fn register(&mut self, event: LifecycleEvent, hook: Arc<dyn LifecycleHook>) {
        self.hooks.entry(event).or_default().push(hook);
    }

    /// Number of hooks attached to an event.
    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.hooks.get(&event).map(Vec::len).unwrap_or(0)
    }

    /// Run every hook attached to the event, in registration order.
    ///
    /// Failures and timeouts are logged and swallowed.
    pub async fn fire(&self, event: LifecycleEvent, domain: &str) {
        let Some(hooks) = self.hooks.get(&event) else {
            return;
        };
        for hook in hooks {
            match tokio::time::timeout(self.timeout, hook.on_event(event, domain)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(?event, domain, error = %e, "lifecycle hook failed");
                }
                Err(_) => {
                    warn!(
                        ?event,
                        domain,
                        timeout_secs = self.timeout.as_secs(),
                        "lifecycle hook timed out"
                    );
                }
            }
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Hook that records every call it receives. Test collaborator.
#[derive(Default)]
pub struct RecordingHook {
    calls: std::sync::Mutex<Vec<(LifecycleEvent, String)>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(LifecycleEvent, String)> {
        self.calls.lock().expect("recording hook poisoned").clone()
    }
}

#[async_trait]
impl LifecycleHook for RecordingHook {
    async fn on_event(
        &self,
        event: LifecycleEvent,
        domain: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls
            .lock()
            .expect("recording hook poisoned")
            .push((event, domain.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingHook;

    #[async_trait]
    impl LifecycleHook for FailingHook {
        async fn on_event(
            &self,
            _event: LifecycleEvent,
            _domain: &str,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("hook exploded".into())
        }
    }

    struct HangingHook;

    #[async_trait]
    impl LifecycleHook for HangingHook {
        async fn on_event(
            &self,
            _event: LifecycleEvent,
            _domain: &str,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hooks_fire_in_registration_order() {
        let first = Arc::new(RecordingHook::new());
        let second = Arc::new(RecordingHook::new());
        let mut registry = HookRegistry::default();
        registry.register(LifecycleEvent::BeforeDomain, first.clone());
        registry.register(LifecycleEvent::BeforeDomain, second.clone());

        registry
            .fire(LifecycleEvent::BeforeDomain, "shop.example.com")
            .await;

        assert_eq!(first.calls().len(), 1);
        assert_eq!(second.calls().len(), 1);
        assert_eq!(
            first.calls()[0],
            (LifecycleEvent::BeforeDomain, "shop.example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_failing_hook_is_swallowed() {
        let after = Arc::new(RecordingHook::new());
        let mut registry = HookRegistry::default();
        registry.register(LifecycleEvent::OnFailure, Arc::new(FailingHook));
        registry.register(LifecycleEvent::OnFailure, after.clone());

        // Does not panic or propagate, and later hooks still run.
        registry.fire(LifecycleEvent::OnFailure, "shop.example.com").await;
        assert_eq!(after.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_hook_times_out() {
        let mut registry = HookRegistry::new(Duration::from_millis(50));
        registry.register(LifecycleEvent::AfterDomain, Arc::new(HangingHook));

        registry.fire(LifecycleEvent::AfterDomain, "shop.example.com").await;
    }

    #[tokio::test]
    async fn test_unregistered_event_is_a_no_op() {
        let registry = HookRegistry::default();
        registry.fire(LifecycleEvent::OnRollback, "shop.example.com").await;
        assert_eq!(registry.count(LifecycleEvent::OnRollback), 0);
    }
}
