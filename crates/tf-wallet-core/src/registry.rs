use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Line-oriented surface a feature renders into.
pub trait Container: Send {
    fn clear(&mut self);
    fn heading(&mut self, text: &str);
    fn line(&mut self, text: &str);

    fn field(&mut self, label: &str, value: &str) {
        self.line(&format!("{label}: {value}"));
    }
}

/// A tab of the wallet. `render` projects the current state synchronously;
/// `init` does the asynchronous setup after the first render.
#[async_trait]
pub trait Feature: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn order(&self) -> u32;
    fn render(&self, container: &mut dyn Container);

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    fn destroy(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureActivated {
    pub id: String,
}

#[derive(Default)]
struct RegistryState {
    features: HashMap<String, Arc<dyn Feature>>,
    active: Option<String>,
    container: Option<Box<dyn Container>>,
}

pub struct FeatureRegistry {
    state: Mutex<RegistryState>,
    events: broadcast::Sender<FeatureActivated>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(RegistryState::default()),
            events,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, feature: Arc<dyn Feature>) {
        self.state()
            .features
            .insert(feature.id().to_owned(), feature);
    }

    /// Registered features in ascending `order`.
    pub fn features(&self) -> Vec<Arc<dyn Feature>> {
        let mut features: Vec<_> = self.state().features.values().cloned().collect();
        features.sort_by_key(|feature| feature.order());
        features
    }

    pub fn set_container(&self, container: Box<dyn Container>) {
        self.state().container = Some(container);
    }

    pub fn active(&self) -> Option<String> {
        self.state().active.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeatureActivated> {
        self.events.subscribe()
    }

    /// Switches to `id`. Returns `false` when the id is unknown or no
    /// container has been set.
    ///
    /// Not reentrant: a second `activate` issued while the first is still
    /// awaiting `init` interleaves with it.
    pub async fn activate(&self, id: &str) -> bool {
        let feature = {
            let mut state = self.state();
            let Some(feature) = state.features.get(id).cloned() else {
                return false;
            };
            if state.container.is_none() {
                return false;
            }

            let previous = state
                .active
                .clone()
                .filter(|previous| previous != id)
                .and_then(|previous| state.features.get(&previous).cloned());
            if let Some(previous) = previous {
                previous.destroy();
            }

            state.active = Some(id.to_owned());
            if let Some(container) = state.container.as_deref_mut() {
                container.clear();
                feature.render(container);
            }
            feature
        };

        if let Err(err) = feature.init().await {
            warn!(feature = id, error = %err, "feature init failed");
        }

        debug!(feature = id, "feature activated");
        let _ = self.events.send(FeatureActivated { id: id.to_owned() });
        true
    }

    /// Re-projects the active feature into the container.
    pub fn rerender(&self) -> bool {
        let mut state = self.state();
        let Some(feature) = state
            .active
            .as_ref()
            .and_then(|id| state.features.get(id))
            .cloned()
        else {
            return false;
        };
        match state.container.as_deref_mut() {
            Some(container) => {
                container.clear();
                feature.render(container);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SharedBuffer;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        renders: AtomicUsize,
        inits: AtomicUsize,
        destroys: AtomicUsize,
    }

    struct TestFeature {
        id: &'static str,
        order: u32,
        fail_init: bool,
        probe: Arc<Probe>,
    }

    impl TestFeature {
        fn new(id: &'static str, order: u32) -> (Arc<Self>, Arc<Probe>) {
            let probe = Arc::new(Probe::default());
            let feature = Arc::new(Self {
                id,
                order,
                fail_init: false,
                probe: probe.clone(),
            });
            (feature, probe)
        }
    }

    #[async_trait]
    impl Feature for TestFeature {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            self.id
        }

        fn order(&self) -> u32 {
            self.order
        }

        fn render(&self, container: &mut dyn Container) {
            self.probe.renders.fetch_add(1, Ordering::SeqCst);
            container.heading(self.id);
        }

        async fn init(&self) -> Result<()> {
            self.probe.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(anyhow!("init failed"));
            }
            Ok(())
        }

        fn destroy(&self) {
            self.probe.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn features_are_listed_by_order() {
        let registry = FeatureRegistry::new();
        registry.register(TestFeature::new("swap", 5).0);
        registry.register(TestFeature::new("dashboard", 1).0);
        registry.register(TestFeature::new("create", 2).0);

        let ids: Vec<_> = registry.features().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["dashboard", "create", "swap"]);
    }

    #[tokio::test]
    async fn activate_without_container_or_unknown_id_is_noop() {
        let registry = FeatureRegistry::new();
        let (feature, probe) = TestFeature::new("dashboard", 1);
        registry.register(feature);

        assert!(!registry.activate("dashboard").await);
        assert_eq!(probe.renders.load(Ordering::SeqCst), 0);

        registry.set_container(Box::new(SharedBuffer::default()));
        assert!(!registry.activate("missing").await);
        assert!(registry.active().is_none());
    }

    #[tokio::test]
    async fn switching_tears_down_the_previous_feature() {
        let registry = FeatureRegistry::new();
        let (dashboard, dash_probe) = TestFeature::new("dashboard", 1);
        let (send, send_probe) = TestFeature::new("send", 4);
        registry.register(dashboard);
        registry.register(send);

        let buffer = SharedBuffer::default();
        registry.set_container(Box::new(buffer.clone()));
        let mut events = registry.subscribe();

        assert!(registry.activate("dashboard").await);
        assert_eq!(events.recv().await.unwrap().id, "dashboard");
        assert_eq!(buffer.lines(), vec!["# dashboard"]);

        // re-activating the same feature does not tear it down
        assert!(registry.activate("dashboard").await);
        assert_eq!(dash_probe.destroys.load(Ordering::SeqCst), 0);
        assert_eq!(dash_probe.inits.load(Ordering::SeqCst), 2);

        assert!(registry.activate("send").await);
        assert_eq!(dash_probe.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(send_probe.renders.load(Ordering::SeqCst), 1);
        assert_eq!(send_probe.inits.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.lines(), vec!["# send"]);
        assert_eq!(registry.active().as_deref(), Some("send"));

        assert!(registry.rerender());
        assert_eq!(send_probe.renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn init_failure_still_completes_activation() {
        let registry = FeatureRegistry::new();
        let probe = Arc::new(Probe::default());
        registry.register(Arc::new(TestFeature {
            id: "faucet",
            order: 3,
            fail_init: true,
            probe: probe.clone(),
        }));
        registry.set_container(Box::new(SharedBuffer::default()));
        let mut events = registry.subscribe();

        assert!(registry.activate("faucet").await);
        assert_eq!(probe.inits.load(Ordering::SeqCst), 1);
        assert_eq!(events.recv().await.unwrap().id, "faucet");
    }
}
