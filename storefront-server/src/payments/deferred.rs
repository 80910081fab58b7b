//! Cash on delivery / bank transfer

use async_trait::async_trait;
use shared::order::{AttemptStatus, PaymentMethod};

use super::{Initiation, OrderDraft, PaymentStrategy};
use crate::orders::CommerceResult;

/// No external call at checkout; an admin confirms once the money arrives
#[derive(Debug, Clone, Copy)]
pub struct DeferredStrategy {
    method: PaymentMethod,
}

impl DeferredStrategy {
    pub fn new(method: PaymentMethod) -> Self {
        debug_assert!(method.is_deferred(), "{method} is not a deferred method");
        Self { method }
    }
}

#[async_trait]
impl PaymentStrategy for DeferredStrategy {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn initiate(&self, draft: &OrderDraft) -> CommerceResult<Initiation> {
        tracing::debug!(order_id = %draft.order_id, method = %self.method, "Deferred payment, nothing to initiate");
        Ok(Initiation {
            reference: None,
            attempt_status: AttemptStatus::Initiated,
            redirect_url: None,
        })
    }
}
