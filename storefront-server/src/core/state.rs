use std::sync::Arc;

use crate::auth::JwtService;
use crate::cart::CartStore;
use crate::core::{Config, Result, ServerError};
use crate::notify::{BroadcastNotifier, Notifier};
use crate::orders::{OrderBuilder, OrderLifecycle};
use crate::payments::{
    CheckoutService, GatewayStrategy, HttpPaymentGateway, LocalProofStore, PaymentCoordinator,
    PaymentGateway, PaymentStrategies, ProofStore,
};
use crate::storage::CommerceStorage;

/// Server state, shared by every handler
///
/// Every field is cheap to clone (redb `Arc<Database>` or an `Arc<..>`).
///
/// | Field | Purpose |
/// |------|------|
/// | config | Settings (immutable) |
/// | storage | redb store |
/// | cart | Carts |
/// | lifecycle | Order status machine |
/// | checkout | Checkout flow |
/// | payments | Payment reconciliation |
/// | notifier | Order notifications |
/// | jwt_service | JWT validation |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: CommerceStorage,
    pub cart: CartStore,
    pub lifecycle: OrderLifecycle,
    pub checkout: CheckoutService,
    pub payments: PaymentCoordinator,
    pub notifier: Arc<BroadcastNotifier>,
    pub jwt_service: Arc<JwtService>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("environment", &self.config.environment)
            .field("methods", &self.checkout.strategies().methods())
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Build the server state
    ///
    /// 1. Open the database (work_dir/database/storefront.redb)
    /// 2. Register payment methods (the gateway only when GATEWAY_URL is set)
    /// 3. Wire up cart, checkout, lifecycle and reconciliation
    pub fn initialize(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let storage = CommerceStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let gateway = HttpPaymentGateway::from_config(&config.gateway)
            .map_err(|e| ServerError::Config(format!("Payment gateway: {}", e)))?
            .map(|g| Arc::new(g) as Arc<dyn PaymentGateway>);
        if gateway.is_none() {
            tracing::warn!("GATEWAY_URL not set, gateway payments are disabled");
        }

        let proof_store: Arc<dyn ProofStore> = Arc::new(LocalProofStore::new(config.proofs_dir()));
        Ok(Self::assemble(config.clone(), storage, gateway, proof_store))
    }

    /// Wire services over a given store and gateway (tests inject in-memory redb and a fake gateway)
    pub fn assemble(
        config: Config,
        storage: CommerceStorage,
        gateway: Option<Arc<dyn PaymentGateway>>,
        proof_store: Arc<dyn ProofStore>,
    ) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new());
        let dyn_notifier: Arc<dyn Notifier> = notifier.clone();

        let mut strategies = PaymentStrategies::with_offline_methods();
        if let Some(gateway) = gateway {
            strategies = strategies.register(Arc::new(GatewayStrategy::new(
                gateway,
                config.public_base_url.clone(),
            )));
        }

        let cart = CartStore::new(storage.clone(), config.pricing.clone());
        let builder = OrderBuilder::new(storage.clone(), config.pricing.clone());
        let lifecycle = OrderLifecycle::new(
            storage.clone(),
            dyn_notifier.clone(),
            config.restock_on_cancel,
        );
        let checkout = CheckoutService::new(cart.clone(), builder, strategies, dyn_notifier);
        let payments = PaymentCoordinator::new(
            lifecycle.clone(),
            proof_store,
            config.gateway.webhook_secret.clone(),
        );
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Self {
            config,
            storage,
            cart,
            lifecycle,
            checkout,
            payments,
            notifier,
            jwt_service,
        }
    }

    pub fn jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }
}
