//! Payment reconciliation
//!
//! Turns external payment outcomes into order changes:
//!
//! | source | outcome |
//! |--------|---------|
//! | gateway webhook `approved` | `pending → processing` |
//! | gateway webhook `rejected` / `cancelled` | attempt `failed`, order stays `pending` |
//! | gateway webhook `pending` / `in_process` | nothing |
//! | admin confirms manual proof | attempt `confirmed`, `pending → processing` |
//! | admin confirms cash / bank transfer | `pending → processing` |
//! | customer uploads proof | attempt `awaiting_confirmation` (re-upload supersedes) |
//!
//! Each reconciliation runs in one write transaction and notifies after commit.

use std::sync::Arc;

use serde::Serialize;
use shared::order::{
    AttemptStatus, Order, OrderStatus, PaymentAttempt, PaymentMethod, ProofUpload, StatusEvent,
};

use super::manual::{ProofStore, describe_proof};
use super::webhook::{GatewayNotification, GatewayPaymentStatus, verify_signature};
use crate::auth::CurrentUser;
use crate::notify::OrderNotification;
use crate::orders::lifecycle::{Actor, OrderLifecycle, check_version};
use crate::orders::{CommerceError, CommerceResult, Resource};
use crate::security_log;

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Confirmed { order_id: String },
    PaymentFailed { order_id: String },
    /// Intermediate status, nothing to record
    Ignored { order_id: String },
    /// Event id seen before
    Duplicate,
    /// Preference id not issued by the gateway for one of our orders
    UnknownReference,
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    lifecycle: OrderLifecycle,
    proof_store: Arc<dyn ProofStore>,
    webhook_secret: Option<String>,
}

impl std::fmt::Debug for PaymentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentCoordinator")
            .field("verifies_signatures", &self.webhook_secret.is_some())
            .finish_non_exhaustive()
    }
}

fn require_admin(user: &CurrentUser) -> CommerceResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(CommerceError::Forbidden(
            "Administrator role is required".to_string(),
        ))
    }
}

impl PaymentCoordinator {
    pub fn new(
        lifecycle: OrderLifecycle,
        proof_store: Arc<dyn ProofStore>,
        webhook_secret: Option<String>,
    ) -> Self {
        if webhook_secret.is_none() {
            tracing::warn!("GATEWAY_WEBHOOK_SECRET not set, webhook signatures are not verified");
        }
        Self {
            lifecycle,
            proof_store,
            webhook_secret,
        }
    }

    fn load_order(
        &self,
        txn: &redb::WriteTransaction,
        order_id: &str,
    ) -> CommerceResult<Order> {
        self.lifecycle
            .storage()
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Order(order_id.to_string())))
    }

    // ========== Gateway ==========

    /// Apply a gateway notification
    ///
    /// Redelivery of the same event id is a no-op. A reference that belongs
    /// to a non-gateway order (e.g. an `MP-` token) is treated as unknown. An
    /// approval for an order that can no longer be confirmed (e.g. cancelled)
    /// is recorded as seen and fails with `InvalidTransition`; the order is
    /// left untouched.
    pub fn handle_gateway_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> CommerceResult<WebhookOutcome> {
        if let Some(secret) = &self.webhook_secret
            && let Err(e) = verify_signature(body, signature, secret)
        {
            security_log!(
                "WARN",
                "webhook_signature_invalid",
                has_signature = signature.is_some(),
                body_len = body.len()
            );
            return Err(e);
        }

        let notification = GatewayNotification::parse(body)?;
        let storage = self.lifecycle.storage();
        let txn = storage.begin_write()?;

        if storage.is_webhook_processed_txn(&txn, &notification.event_id)? {
            tracing::info!(event_id = %notification.event_id, "Duplicate webhook ignored");
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(order_id) =
            storage.find_order_by_reference_txn(&txn, &notification.preference_id)?
        else {
            tracing::warn!(
                event_id = %notification.event_id,
                preference_id = %notification.preference_id,
                "Webhook for unknown payment reference"
            );
            return Ok(WebhookOutcome::UnknownReference);
        };

        let mut order = self.load_order(&txn, &order_id)?;
        if order.payment_method != PaymentMethod::Gateway {
            security_log!(
                "WARN",
                "webhook_reference_method_mismatch",
                order_id = order.id.as_str(),
                payment_method = order.payment_method.as_str(),
                event_id = notification.event_id.as_str()
            );
            return Ok(WebhookOutcome::UnknownReference);
        }
        let now = shared::util::now_millis();

        let (outcome, notification_out) = match notification.status {
            GatewayPaymentStatus::Approved => {
                match self.lifecycle.apply_in_txn(
                    &txn,
                    &mut order,
                    &Actor::System,
                    StatusEvent::PaymentConfirmed,
                    None,
                ) {
                    Ok(from) => (
                        WebhookOutcome::Confirmed {
                            order_id: order.id.clone(),
                        },
                        Some(OrderNotification::status_changed(&order, from)),
                    ),
                    Err(e) => {
                        // Remember the event so redelivery does not retry forever
                        tracing::warn!(
                            order_id = %order.id,
                            status = %order.status,
                            event_id = %notification.event_id,
                            error = %e,
                            "Gateway approval cannot be applied"
                        );
                        storage.mark_webhook_processed(&txn, &notification.event_id, &order.id)?;
                        txn.commit()?;
                        return Err(e);
                    }
                }
            }
            status if status.is_failure() => {
                let reason = notification
                    .status_detail
                    .clone()
                    .unwrap_or_else(|| format!("{:?}", status).to_lowercase());
                let open_attempt = order.payment_attempts.iter_mut().rev().find(|a| {
                    a.status.is_open()
                        && a.external_reference.as_deref()
                            == Some(notification.preference_id.as_str())
                });
                match open_attempt {
                    Some(attempt) => {
                        attempt.status = AttemptStatus::Failed;
                        attempt.failure_reason = Some(reason.clone());
                        attempt.updated_at = now;
                        order.version += 1;
                        order.updated_at = now;
                        tracing::info!(order_id = %order.id, reason = %reason, "Gateway payment failed");
                        (
                            WebhookOutcome::PaymentFailed {
                                order_id: order.id.clone(),
                            },
                            Some(OrderNotification::PaymentFailed {
                                order_id: order.id.clone(),
                                user_id: order.user_id.clone(),
                                reason,
                            }),
                        )
                    }
                    None => {
                        tracing::info!(
                            order_id = %order.id,
                            status = %order.status,
                            "Gateway failure for an attempt that is no longer open"
                        );
                        (
                            WebhookOutcome::Ignored {
                                order_id: order.id.clone(),
                            },
                            None,
                        )
                    }
                }
            }
            _ => {
                tracing::debug!(order_id = %order.id, status = ?notification.status, "Intermediate gateway status");
                (
                    WebhookOutcome::Ignored {
                        order_id: order.id.clone(),
                    },
                    None,
                )
            }
        };

        if notification_out.is_some() {
            storage.store_order(&txn, &order)?;
        }
        storage.mark_webhook_processed(&txn, &notification.event_id, &order.id)?;
        txn.commit()?;

        if let Some(n) = notification_out {
            self.lifecycle.notifier().notify(n);
        }
        Ok(outcome)
    }

    // ========== Admin confirmation ==========

    /// Confirm a manual-proof payment after checking the uploaded proof
    pub fn confirm_manual_payment(
        &self,
        admin: &CurrentUser,
        order_id: &str,
        expected_version: Option<u64>,
    ) -> CommerceResult<Order> {
        self.confirm(admin, order_id, expected_version, |order| {
            if order.payment_method != PaymentMethod::ManualProof {
                return Err(CommerceError::Validation(format!(
                    "Order {} is paid by {}, not manual proof",
                    order.id, order.payment_method
                )));
            }
            let awaiting = order
                .payment_attempts
                .iter()
                .any(|a| a.status == AttemptStatus::AwaitingConfirmation);
            if !awaiting {
                return Err(CommerceError::NotAwaitingConfirmation);
            }
            Ok(())
        })
    }

    /// Confirm cash on delivery / bank transfer
    pub fn confirm_deferred_payment(
        &self,
        admin: &CurrentUser,
        order_id: &str,
        expected_version: Option<u64>,
    ) -> CommerceResult<Order> {
        self.confirm(admin, order_id, expected_version, |order| {
            if !order.payment_method.is_deferred() {
                return Err(CommerceError::Validation(format!(
                    "Order {} is paid by {}, not cash or bank transfer",
                    order.id, order.payment_method
                )));
            }
            Ok(())
        })
    }

    /// Admin confirmation dispatched on the order's payment method
    ///
    /// Gateway payments are confirmed by the gateway only.
    pub fn confirm_payment(
        &self,
        admin: &CurrentUser,
        order_id: &str,
        expected_version: Option<u64>,
    ) -> CommerceResult<Order> {
        require_admin(admin)?;
        let order = self
            .lifecycle
            .storage()
            .get_order(order_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Order(order_id.to_string())))?;
        match order.payment_method {
            PaymentMethod::ManualProof => {
                self.confirm_manual_payment(admin, order_id, expected_version)
            }
            PaymentMethod::Cash | PaymentMethod::BankTransfer => {
                self.confirm_deferred_payment(admin, order_id, expected_version)
            }
            PaymentMethod::Gateway => Err(CommerceError::Validation(
                "Gateway payments are confirmed by the gateway".to_string(),
            )),
        }
    }

    fn confirm<F>(
        &self,
        admin: &CurrentUser,
        order_id: &str,
        expected_version: Option<u64>,
        precondition: F,
    ) -> CommerceResult<Order>
    where
        F: FnOnce(&Order) -> CommerceResult<()>,
    {
        require_admin(admin)?;
        let storage = self.lifecycle.storage();
        let txn = storage.begin_write()?;
        let mut order = self.load_order(&txn, order_id)?;

        check_version(&order, expected_version)?;
        order.status.apply(StatusEvent::PaymentConfirmed)?;
        precondition(&order)?;

        let from = self.lifecycle.apply_in_txn(
            &txn,
            &mut order,
            &Actor::from(admin),
            StatusEvent::PaymentConfirmed,
            expected_version,
        )?;
        storage.store_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order.id, admin = %admin.id, method = %order.payment_method, "Payment confirmed by admin");
        self.lifecycle
            .notifier()
            .notify(OrderNotification::status_changed(&order, from));
        Ok(order)
    }

    // ========== Proof upload ==========

    /// Record a new proof for the customer's manual-proof order
    ///
    /// The first proof moves the checkout attempt to awaiting confirmation.
    /// A later proof supersedes whatever is still awaiting.
    pub fn submit_proof(
        &self,
        user: &CurrentUser,
        order_id: &str,
        proof: ProofUpload,
    ) -> CommerceResult<Order> {
        let storage = self.lifecycle.storage();
        let txn = storage.begin_write()?;
        let mut order = self.load_order(&txn, order_id)?;
        Self::check_proof_allowed(user, &order)?;

        let now = shared::util::now_millis();
        if let Some(attempt) = order
            .payment_attempts
            .iter_mut()
            .find(|a| a.status == AttemptStatus::Initiated && a.proof.is_none())
        {
            attempt.status = AttemptStatus::AwaitingConfirmation;
            attempt.proof = Some(proof);
            attempt.updated_at = now;
        } else {
            for attempt in order
                .payment_attempts
                .iter_mut()
                .filter(|a| a.status.is_open())
            {
                attempt.status = AttemptStatus::Failed;
                attempt.failure_reason = Some("superseded by a newer proof".to_string());
                attempt.updated_at = now;
            }
            order.payment_attempts.push(PaymentAttempt {
                attempt_id: uuid::Uuid::new_v4().to_string(),
                method: PaymentMethod::ManualProof,
                external_reference: order.payment_reference.clone(),
                status: AttemptStatus::AwaitingConfirmation,
                proof: Some(proof),
                failure_reason: None,
                created_at: now,
                updated_at: now,
            });
        }
        order.version += 1;
        order.updated_at = now;

        storage.store_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order.id, attempts = order.payment_attempts.len(), "Payment proof submitted");
        self.lifecycle
            .notifier()
            .notify(OrderNotification::ProofSubmitted {
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
            });
        Ok(order)
    }

    /// Validate, store the image, then record the proof on the order
    pub async fn upload_proof(
        &self,
        user: &CurrentUser,
        order_id: &str,
        file_name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> CommerceResult<Order> {
        let proof = describe_proof(file_name, content_type, data)?;

        // Fail before writing the blob when the order cannot take a proof
        let order = self
            .lifecycle
            .storage()
            .get_order(order_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Order(order_id.to_string())))?;
        Self::check_proof_allowed(user, &order)?;

        self.proof_store.save(order_id, &proof, data).await?;
        self.submit_proof(user, order_id, proof)
    }

    fn check_proof_allowed(user: &CurrentUser, order: &Order) -> CommerceResult<()> {
        if order.user_id != user.id {
            return Err(CommerceError::Forbidden(format!(
                "Order {} belongs to another customer",
                order.id
            )));
        }
        if order.payment_method != PaymentMethod::ManualProof {
            return Err(CommerceError::Validation(format!(
                "Order {} does not take a payment proof",
                order.id
            )));
        }
        if order.status != OrderStatus::Pending {
            return Err(CommerceError::Validation(format!(
                "Order {} is {} and no longer awaiting payment",
                order.id, order.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ADMIN_ROLE;
    use crate::notify::BroadcastNotifier;
    use crate::payments::LocalProofStore;
    use crate::payments::webhook::sign;
    use crate::storage::CommerceStorage;
    use rust_decimal_macros::dec;
    use shared::order::{OrderItem, ShippingInfo, StatusTimeline};

    const SECRET: &str = "test-webhook-secret";

    fn customer(id: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: id.to_string(),
            role: "customer".to_string(),
        }
    }

    fn admin() -> CurrentUser {
        CurrentUser {
            id: "admin-1".to_string(),
            username: "admin".to_string(),
            role: ADMIN_ROLE.to_string(),
        }
    }

    struct Fixture {
        storage: CommerceStorage,
        coordinator: PaymentCoordinator,
        notifier: Arc<BroadcastNotifier>,
        _proofs: tempfile::TempDir,
    }

    fn fixture(secret: Option<&str>) -> Fixture {
        let storage = CommerceStorage::open_in_memory().unwrap();
        let notifier = Arc::new(BroadcastNotifier::new());
        let lifecycle = OrderLifecycle::new(storage.clone(), notifier.clone(), true);
        let proofs = tempfile::tempdir().unwrap();
        let coordinator = PaymentCoordinator::new(
            lifecycle,
            Arc::new(LocalProofStore::new(proofs.path())),
            secret.map(String::from),
        );
        Fixture {
            storage,
            coordinator,
            notifier,
            _proofs: proofs,
        }
    }

    fn seed(
        storage: &CommerceStorage,
        method: PaymentMethod,
        reference: Option<&str>,
        attempt_status: AttemptStatus,
        status: OrderStatus,
    ) -> Order {
        let order = Order {
            id: "o-1".to_string(),
            user_id: "u1".to_string(),
            status,
            payment_method: method,
            payment_reference: reference.map(String::from),
            items: vec![OrderItem {
                product_id: "a".to_string(),
                name: "A".to_string(),
                quantity: 1,
                unit_price: dec!(15.00),
                subtotal: dec!(15.00),
            }],
            subtotal: dec!(15.00),
            shipping_cost: dec!(10.00),
            tax: dec!(0),
            total: dec!(25.00),
            shipping_info: ShippingInfo::default(),
            payment_attempts: vec![PaymentAttempt {
                attempt_id: "att-1".to_string(),
                method,
                external_reference: reference.map(String::from),
                status: attempt_status,
                proof: None,
                failure_reason: None,
                created_at: 0,
                updated_at: 0,
            }],
            timeline: StatusTimeline::started(0),
            version: 1,
            cancel_reason: None,
            created_at: 0,
            updated_at: 0,
        };
        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, &order).unwrap();
        if let Some(r) = reference {
            storage.store_payment_ref(&txn, r, &order.id).unwrap();
        }
        txn.commit().unwrap();
        order
    }

    fn webhook_body(event_id: &str, status: &str) -> Vec<u8> {
        webhook_body_for(event_id, "pref-1", status)
    }

    fn webhook_body_for(event_id: &str, reference: &str, status: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event_id": event_id,
            "preference_id": reference,
            "status": status,
        }))
        .unwrap()
    }

    fn seed_gateway(storage: &CommerceStorage, status: OrderStatus) -> Order {
        seed(
            storage,
            PaymentMethod::Gateway,
            Some("pref-1"),
            AttemptStatus::Initiated,
            status,
        )
    }

    #[test]
    fn test_approved_webhook_moves_order_to_processing() {
        let f = fixture(Some(SECRET));
        seed_gateway(&f.storage, OrderStatus::Pending);
        let mut rx = f.notifier.subscribe();

        let body = webhook_body("evt-1", "approved");
        let sig = sign(&body, SECRET);
        let outcome = f
            .coordinator
            .handle_gateway_webhook(&body, Some(&sig))
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Confirmed {
                order_id: "o-1".into()
            }
        );

        let order = f.storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.version, 2);
        assert_eq!(order.payment_attempts[0].status, AttemptStatus::Confirmed);
        assert!(matches!(
            rx.try_recv().unwrap(),
            OrderNotification::StatusChanged {
                to: OrderStatus::Processing,
                ..
            }
        ));
    }

    #[test]
    fn test_redelivered_webhook_is_idempotent() {
        let f = fixture(None);
        seed_gateway(&f.storage, OrderStatus::Pending);
        let body = webhook_body("evt-1", "approved");

        f.coordinator.handle_gateway_webhook(&body, None).unwrap();
        let again = f.coordinator.handle_gateway_webhook(&body, None).unwrap();
        assert_eq!(again, WebhookOutcome::Duplicate);
        assert_eq!(f.storage.get_order("o-1").unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_bad_signature_changes_nothing() {
        let f = fixture(Some(SECRET));
        seed_gateway(&f.storage, OrderStatus::Pending);
        let body = webhook_body("evt-1", "approved");

        let err = f
            .coordinator
            .handle_gateway_webhook(&body, Some("deadbeef"))
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidSignature));
        assert!(f.coordinator.handle_gateway_webhook(&body, None).is_err());
        assert_eq!(
            f.storage.get_order("o-1").unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_rejected_webhook_fails_attempt_only() {
        let f = fixture(None);
        seed_gateway(&f.storage, OrderStatus::Pending);

        let outcome = f
            .coordinator
            .handle_gateway_webhook(&webhook_body("evt-2", "rejected"), None)
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::PaymentFailed { .. }));

        let order = f.storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_attempts[0].status, AttemptStatus::Failed);
        assert_eq!(
            order.payment_attempts[0].failure_reason.as_deref(),
            Some("rejected")
        );
    }

    #[test]
    fn test_in_process_webhook_is_a_noop() {
        let f = fixture(None);
        seed_gateway(&f.storage, OrderStatus::Pending);
        let outcome = f
            .coordinator
            .handle_gateway_webhook(&webhook_body("evt-3", "in_process"), None)
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
        assert_eq!(f.storage.get_order("o-1").unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_approval_never_resurrects_cancelled_order() {
        let f = fixture(None);
        seed_gateway(&f.storage, OrderStatus::Cancelled);
        let body = webhook_body("evt-4", "approved");

        let err = f.coordinator.handle_gateway_webhook(&body, None).unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidTransition {
                from: OrderStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(
            f.storage.get_order("o-1").unwrap().unwrap().status,
            OrderStatus::Cancelled
        );
        // Recorded as seen
        assert_eq!(
            f.coordinator.handle_gateway_webhook(&body, None).unwrap(),
            WebhookOutcome::Duplicate
        );
    }

    #[test]
    fn test_rejection_for_closed_attempt_changes_nothing() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::Gateway,
            Some("pref-1"),
            AttemptStatus::Failed,
            OrderStatus::Pending,
        );
        let mut rx = f.notifier.subscribe();

        let outcome = f
            .coordinator
            .handle_gateway_webhook(&webhook_body("evt-6", "rejected"), None)
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                order_id: "o-1".into()
            }
        );
        let order = f.storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(order.version, 1);
        assert_eq!(order.payment_attempts[0].failure_reason, None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_webhook_never_confirms_manual_proof_order() {
        let f = fixture(Some(SECRET));
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::AwaitingConfirmation,
            OrderStatus::Pending,
        );

        let body = webhook_body_for("evt-7", "MP-1", "approved");
        let sig = sign(&body, SECRET);
        let outcome = f
            .coordinator
            .handle_gateway_webhook(&body, Some(&sig))
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownReference);

        let order = f.storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(
            order.payment_attempts[0].status,
            AttemptStatus::AwaitingConfirmation
        );
    }

    #[test]
    fn test_unknown_reference_is_acknowledged() {
        let f = fixture(None);
        let outcome = f
            .coordinator
            .handle_gateway_webhook(&webhook_body("evt-5", "approved"), None)
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownReference);
    }

    #[test]
    fn test_manual_confirmation_requires_awaiting_attempt() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::Failed,
            OrderStatus::Pending,
        );
        assert!(matches!(
            f.coordinator.confirm_manual_payment(&admin(), "o-1", None),
            Err(CommerceError::NotAwaitingConfirmation)
        ));
    }

    #[test]
    fn test_manual_confirmation_needs_an_uploaded_proof() {
        let f = fixture(None);
        // State right after checkout: reference issued, nothing uploaded
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::Initiated,
            OrderStatus::Pending,
        );
        assert!(matches!(
            f.coordinator.confirm_payment(&admin(), "o-1", None),
            Err(CommerceError::NotAwaitingConfirmation)
        ));
        let order = f.storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
    }

    #[test]
    fn test_manual_confirmation_by_admin() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::AwaitingConfirmation,
            OrderStatus::Pending,
        );

        assert!(matches!(
            f.coordinator
                .confirm_manual_payment(&customer("u1"), "o-1", None),
            Err(CommerceError::Forbidden(_))
        ));
        assert!(matches!(
            f.coordinator.confirm_manual_payment(&admin(), "o-1", Some(9)),
            Err(CommerceError::VersionConflict { .. })
        ));

        let order = f
            .coordinator
            .confirm_payment(&admin(), "o-1", Some(1))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_attempts[0].status, AttemptStatus::Confirmed);
    }

    #[test]
    fn test_deferred_confirmation() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::Cash,
            None,
            AttemptStatus::Initiated,
            OrderStatus::Pending,
        );
        let order = f
            .coordinator
            .confirm_payment(&admin(), "o-1", None)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.timeline.processing_at.is_some());
    }

    #[test]
    fn test_admin_cannot_confirm_gateway_payment() {
        let f = fixture(None);
        seed_gateway(&f.storage, OrderStatus::Pending);
        assert!(matches!(
            f.coordinator.confirm_payment(&admin(), "o-1", None),
            Err(CommerceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reupload_supersedes_previous_proof() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::Initiated,
            OrderStatus::Pending,
        );
        let user = customer("u1");

        let first = f
            .coordinator
            .upload_proof(&user, "o-1", "first.png", Some("image/png"), b"first")
            .await
            .unwrap();
        assert_eq!(first.payment_attempts.len(), 1);
        assert_eq!(
            first.payment_attempts[0].status,
            AttemptStatus::AwaitingConfirmation
        );
        let order = f
            .coordinator
            .upload_proof(&user, "o-1", "second.jpg", None, b"second")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 3);
        let statuses: Vec<_> = order.payment_attempts.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![AttemptStatus::Failed, AttemptStatus::AwaitingConfirmation]
        );
        let latest = order.payment_attempts.last().unwrap();
        assert_eq!(latest.proof.as_ref().unwrap().file_name, "second.jpg");
        assert_eq!(latest.external_reference.as_deref(), Some("MP-1"));
    }

    #[tokio::test]
    async fn test_only_owner_uploads_proof() {
        let f = fixture(None);
        seed(
            &f.storage,
            PaymentMethod::ManualProof,
            Some("MP-1"),
            AttemptStatus::AwaitingConfirmation,
            OrderStatus::Pending,
        );
        let err = f
            .coordinator
            .upload_proof(&customer("u2"), "o-1", "p.png", None, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));
    }
}
