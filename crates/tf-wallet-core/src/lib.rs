//! Wallet session services for Tempo stablecoins: key custody, balance
//! polling, transaction history and the feature tabs built on top of them.

pub mod account;
pub mod activity;
pub mod app;
pub mod cache;
pub mod connector;
pub mod error;
pub mod features;
pub mod polling;
pub mod registry;

#[cfg(test)]
mod test_utils;

pub use account::AccountManager;
pub use activity::ActivityFeed;
pub use app::{MountedFeatures, WalletServices, mount_features};
pub use cache::BalanceCache;
pub use connector::ChainConnector;
pub use error::FlowError;
pub use polling::{PollingScheduler, Visibility};
pub use registry::{Container, Feature, FeatureActivated, FeatureRegistry};
