use std::sync::Arc;

use super::{error::HostError, factory::Providers, handler::WalletHandler};
use crate::provider::Subscription;

/// Everything the host knows about the current wallet.
#[derive(Default)]
pub struct Session {
    pub handler: Option<Arc<WalletHandler>>,
    pub providers: Option<Providers>,
    pub funds_subscription: Option<Subscription>,
    pub contract_subscription: Option<Subscription>,
}

impl Session {
    pub fn is_initialized(&self) -> bool {
        self.handler.is_some()
    }

    pub fn ready(&self) -> Result<(Arc<WalletHandler>, Providers), HostError> {
        match (&self.handler, &self.providers) {
            (Some(handler), Some(providers)) => Ok((Arc::clone(handler), providers.clone())),
            _ => Err(HostError::WalletNotInitialized),
        }
    }

    /// Whether `handler` is still the wallet this session serves.
    pub fn serves(&self, handler: &Arc<WalletHandler>) -> bool {
        self.handler
            .as_ref()
            .map(|current| Arc::ptr_eq(current, handler))
            .unwrap_or(false)
    }

    pub fn teardown(&mut self) {
        if let Some(subscription) = self.funds_subscription.take() {
            subscription.cancel();
        }
        if let Some(subscription) = self.contract_subscription.take() {
            subscription.cancel();
        }
        self.handler = None;
        self.providers = None;
    }
}
