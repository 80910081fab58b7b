//! Shared integration test helpers: in-memory database and a scripted fake gateway

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::models::Product;
use shared::order::ShippingInfo;
use storefront_server::auth::{ADMIN_ROLE, CurrentUser, JwtConfig};
use storefront_server::core::config::GatewayConfig;
use storefront_server::orders::money::PricingConfig;
use storefront_server::payments::{
    GatewayError, LocalProofStore, PaymentGateway, PreferenceRequest, PreferenceResponse,
};
use storefront_server::{CommerceStorage, Config, ServerState};
use tokio::sync::Mutex;

pub const WEBHOOK_SECRET: &str = "integration-webhook-secret";

/// Gateway that replays scripted results in order, then succeeds
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<GatewayError>>,
    calls: AtomicU32,
}

impl ScriptedGateway {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_with(errors: Vec<GatewayError>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(errors.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.script.lock().await.pop_front() {
            return Err(err);
        }
        Ok(PreferenceResponse {
            preference_id: format!("pref-{}", request.external_reference),
            redirect_url: format!(
                "https://pay.example/checkout?pref={}",
                request.external_reference
            ),
        })
    }
}

pub fn test_config(work_dir: &std::path::Path) -> Config {
    Config {
        work_dir: work_dir.display().to_string(),
        http_port: 0,
        environment: "test".to_string(),
        pricing: PricingConfig {
            free_shipping_threshold: dec!(100),
            flat_shipping_fee: dec!(10),
            tax_rate: dec!(0),
        },
        gateway: GatewayConfig {
            base_url: None,
            access_token: String::new(),
            timeout_ms: 1_000,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        },
        public_base_url: "https://shop.example".to_string(),
        restock_on_cancel: true,
        jwt: JwtConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            expiration_minutes: 60,
            issuer: "storefront".to_string(),
            audience: "storefront-clients".to_string(),
        },
        log_level: "debug".to_string(),
        log_dir: None,
        request_timeout_ms: 10_000,
    }
}

pub struct TestApp {
    pub state: ServerState,
    pub storage: CommerceStorage,
    _work_dir: tempfile::TempDir,
}

pub fn app_with_gateway(gateway: Option<Arc<dyn PaymentGateway>>) -> TestApp {
    app_with_storage(CommerceStorage::open_in_memory().unwrap(), gateway)
}

pub fn app_with_storage(
    storage: CommerceStorage,
    gateway: Option<Arc<dyn PaymentGateway>>,
) -> TestApp {
    storefront_server::init_logger();
    let work_dir = tempfile::tempdir().unwrap();
    let config = test_config(work_dir.path());
    let proofs = Arc::new(LocalProofStore::new(config.proofs_dir()));
    let state = ServerState::assemble(config, storage.clone(), gateway, proofs);
    TestApp {
        state,
        storage,
        _work_dir: work_dir,
    }
}

pub fn app() -> TestApp {
    app_with_gateway(None)
}

pub fn product(id: &str, price: Decimal, stock: u32) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        price,
        stock,
        discount_percent: Decimal::ZERO,
        is_active: true,
        updated_at: 0,
    }
}

pub fn customer(id: &str) -> CurrentUser {
    CurrentUser {
        id: id.to_string(),
        username: id.to_string(),
        role: "customer".to_string(),
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        id: "admin-1".to_string(),
        username: "admin".to_string(),
        role: ADMIN_ROLE.to_string(),
    }
}

pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        full_name: "Ana Diaz".to_string(),
        address: "Av. Larco 123".to_string(),
        city: "Lima".to_string(),
        postal_code: "15074".to_string(),
        phone: "999888777".to_string(),
        notes: None,
    }
}
