//! Checkout orchestration
//!
//! ```text
//! cart.snapshot ─► builder.draft ─► strategy.initiate ─► builder.create_order ─► cart.clear ─► notify
//!   (read)           (validate)       (async, no txn)       (one write txn)
//! ```
//!
//! A failure anywhere before `create_order` commits leaves no order, no
//! stock change and the cart as it was.

use std::sync::Arc;

use shared::order::{CheckoutRequest, CheckoutResponse};

use super::PaymentStrategies;
use crate::auth::CurrentUser;
use crate::cart::CartStore;
use crate::notify::{Notifier, OrderNotification};
use crate::orders::CommerceResult;
use crate::orders::builder::OrderBuilder;

#[derive(Clone)]
pub struct CheckoutService {
    cart: CartStore,
    builder: OrderBuilder,
    strategies: PaymentStrategies,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

impl CheckoutService {
    pub fn new(
        cart: CartStore,
        builder: OrderBuilder,
        strategies: PaymentStrategies,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cart,
            builder,
            strategies,
            notifier,
        }
    }

    pub fn strategies(&self) -> &PaymentStrategies {
        &self.strategies
    }

    /// Turn the user's cart into a pending order
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        request: CheckoutRequest,
    ) -> CommerceResult<CheckoutResponse> {
        let strategy = self.strategies.get(request.payment_method)?;
        let snapshot = self.cart.snapshot(&user.id)?;
        let draft = self.builder.draft(
            &user.id,
            request.shipping_info,
            request.payment_method,
            &snapshot,
        )?;

        tracing::info!(
            order_id = %draft.order_id,
            user_id = %user.id,
            payment_method = %draft.payment_method,
            total = %draft.totals.total,
            "Checkout started"
        );

        let initiation = strategy.initiate(&draft).await?;

        let order = match self.builder.create_order(&draft, &initiation) {
            Ok(order) => order,
            Err(e) => {
                if let Some(reference) = &initiation.reference {
                    tracing::warn!(
                        order_id = %draft.order_id,
                        reference = %reference,
                        error = %e,
                        "Order creation failed after payment initiation, reference abandoned"
                    );
                }
                return Err(e);
            }
        };

        // The order is committed; a failed clear must not fail checkout
        if let Err(e) = self.cart.clear(&user.id) {
            tracing::error!(order_id = %order.id, user_id = %user.id, error = %e, "Failed to clear cart after checkout");
        }

        self.notifier.notify(OrderNotification::created(&order));
        Ok(CheckoutResponse {
            order,
            redirect_url: initiation.redirect_url,
        })
    }
}
