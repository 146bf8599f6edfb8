use crate::activity::ActivityFeed;
use crate::cache::BalanceCache;
use crate::connector::ChainConnector;
use crate::features::{
    DashboardFeature, DeployFeature, FaucetFeature, MintFeature, SendFeature, SwapFeature,
};
use crate::polling::PollingScheduler;
use crate::registry::FeatureRegistry;
use std::sync::Arc;
use tf_chain_client::ChainConfig;
use tf_storage::{HistoryStore, KeyValueStore, UserTokenList};

/// Everything a feature needs for one unlocked session.
pub struct WalletServices {
    pub connector: Arc<ChainConnector>,
    pub cache: Arc<BalanceCache>,
    pub history: HistoryStore,
    pub tokens: UserTokenList,
    pub scheduler: Arc<PollingScheduler>,
    pub feed: Arc<ActivityFeed>,
    pub config: ChainConfig,
}

impl WalletServices {
    pub fn new(
        connector: ChainConnector,
        store: Arc<dyn KeyValueStore>,
        scheduler: Arc<PollingScheduler>,
    ) -> Arc<Self> {
        let config = connector.config().clone();
        Arc::new(Self {
            connector: Arc::new(connector),
            cache: Arc::new(BalanceCache::new()),
            history: HistoryStore::new(store.clone()),
            tokens: UserTokenList::new(store),
            scheduler,
            feed: Arc::new(ActivityFeed::new()),
            config,
        })
    }
}

/// Typed handles on the mounted features, for callers that drive actions.
#[derive(Clone)]
pub struct MountedFeatures {
    pub dashboard: Arc<DashboardFeature>,
    pub deploy: Arc<DeployFeature>,
    pub faucet: Arc<FaucetFeature>,
    pub send: Arc<SendFeature>,
    pub swap: Arc<SwapFeature>,
    pub mint: Arc<MintFeature>,
}

pub fn mount_features(services: &Arc<WalletServices>, registry: &FeatureRegistry) -> MountedFeatures {
    let mounted = MountedFeatures {
        dashboard: Arc::new(DashboardFeature::new(services.clone())),
        deploy: Arc::new(DeployFeature::new(services.clone())),
        faucet: Arc::new(FaucetFeature::new(services.clone())),
        send: Arc::new(SendFeature::new(services.clone())),
        swap: Arc::new(SwapFeature::new(services.clone())),
        mint: Arc::new(MintFeature::new(services.clone())),
    };

    registry.register(mounted.dashboard.clone());
    registry.register(mounted.deploy.clone());
    registry.register(mounted.faucet.clone());
    registry.register(mounted.send.clone());
    registry.register(mounted.swap.clone());
    registry.register(mounted.mint.clone());
    mounted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SIGNER, SharedBuffer, harness};

    #[tokio::test]
    async fn mounts_six_tabs_in_order() {
        let h = harness();
        let registry = FeatureRegistry::new();
        mount_features(&h.services, &registry);

        let tabs: Vec<_> = registry
            .features()
            .iter()
            .map(|f| (f.id(), f.order()))
            .collect();
        assert_eq!(
            tabs,
            vec![
                ("dashboard", 1),
                ("create", 2),
                ("faucet", 3),
                ("send", 4),
                ("swap", 5),
                ("mint", 6),
            ]
        );

        let buffer = SharedBuffer::default();
        registry.set_container(Box::new(buffer.clone()));
        assert!(registry.activate("dashboard").await);
        assert!(buffer.text().contains("# Dashboard"));
        assert_eq!(h.services.cache.address(), Some(SIGNER));
    }
}
