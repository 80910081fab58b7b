//! Payment Coordinator
//!
//! One [`PaymentStrategy`] per [`PaymentMethod`]:
//!
//! - [`GatewayStrategy`]: hosted checkout with redirect, confirmed by webhook
//! - [`ManualProofStrategy`]: uploaded proof, confirmed by an admin
//! - [`DeferredStrategy`]: cash / bank transfer, confirmed by an admin
//!
//! Strategies only *initiate*. Confirmation lives in [`PaymentCoordinator`].

pub mod checkout;
pub mod coordinator;
pub mod deferred;
pub mod gateway;
pub mod manual;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shared::order::{AttemptStatus, PaymentMethod};

use crate::orders::{CommerceError, CommerceResult};

pub use crate::orders::builder::OrderDraft;
pub use checkout::CheckoutService;
pub use coordinator::PaymentCoordinator;
pub use deferred::DeferredStrategy;
pub use gateway::{
    GatewayError, GatewayStrategy, HttpPaymentGateway, PaymentGateway, PreferenceRequest,
    PreferenceResponse,
};
pub use manual::{LocalProofStore, ManualProofStrategy, ProofStore};
pub use webhook::{GatewayNotification, GatewayPaymentStatus};

/// Outcome of initiating a payment for a draft order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiation {
    /// External reference (gateway preference id, manual-proof token)
    pub reference: Option<String>,
    /// Status of the first payment attempt
    pub attempt_status: AttemptStatus,
    /// Where the client is sent to pay, if anywhere
    pub redirect_url: Option<String>,
}

#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Runs before the order exists and outside any transaction
    async fn initiate(&self, draft: &OrderDraft) -> CommerceResult<Initiation>;
}

/// Strategy registry keyed by method
#[derive(Clone, Default)]
pub struct PaymentStrategies {
    strategies: HashMap<PaymentMethod, Arc<dyn PaymentStrategy>>,
}

impl std::fmt::Debug for PaymentStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStrategies")
            .field("methods", &self.methods())
            .finish()
    }
}

impl PaymentStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manual proof plus both deferred methods; the gateway is registered
    /// separately once configured.
    pub fn with_offline_methods() -> Self {
        Self::new()
            .register(Arc::new(ManualProofStrategy))
            .register(Arc::new(DeferredStrategy::new(PaymentMethod::Cash)))
            .register(Arc::new(DeferredStrategy::new(PaymentMethod::BankTransfer)))
    }

    pub fn register(mut self, strategy: Arc<dyn PaymentStrategy>) -> Self {
        self.strategies.insert(strategy.method(), strategy);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> CommerceResult<Arc<dyn PaymentStrategy>> {
        self.strategies
            .get(&method)
            .cloned()
            .ok_or(CommerceError::UnsupportedMethod(method))
    }

    pub fn methods(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<_> = self.strategies.keys().copied().collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_methods_are_registered() {
        let strategies = PaymentStrategies::with_offline_methods();
        assert_eq!(
            strategies.methods(),
            vec![
                PaymentMethod::BankTransfer,
                PaymentMethod::Cash,
                PaymentMethod::ManualProof
            ]
        );
    }

    #[test]
    fn test_unregistered_gateway_is_unsupported() {
        let strategies = PaymentStrategies::with_offline_methods();
        assert!(matches!(
            strategies.get(PaymentMethod::Gateway),
            Err(CommerceError::UnsupportedMethod(PaymentMethod::Gateway))
        ));
    }
}
