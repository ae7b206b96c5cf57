// File: clawbot-core/src/delivery/mod.rs

pub mod dispatcher;
pub mod provider;
pub mod shipping;

pub use dispatcher::{prize_message, DeliveryDispatcher, DigitalMethod, ProviderRegistration};
pub use provider::{DeliveryProvider, HttpRewardProvider, OfflineCodeProvider};
