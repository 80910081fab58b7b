//! Manual proof-of-payment (wallet / QR transfer)
//!
//! Checkout issues an `MP-<uuid>` reference the customer quotes in the
//! transfer. The customer then uploads a screenshot; an admin compares it
//! against the account and confirms. Nothing here ever confirms on its own.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared::order::{AttemptStatus, PaymentMethod, ProofUpload};

use super::{Initiation, OrderDraft, PaymentStrategy};
use crate::orders::{CommerceError, CommerceResult};

/// Maximum proof image size (5MB)
pub const MAX_PROOF_SIZE: usize = 5 * 1024 * 1024;

/// Accepted proof formats
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualProofStrategy;

impl ManualProofStrategy {
    pub fn new_reference() -> String {
        format!("MP-{}", uuid::Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentStrategy for ManualProofStrategy {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::ManualProof
    }

    async fn initiate(&self, draft: &OrderDraft) -> CommerceResult<Initiation> {
        let reference = Self::new_reference();
        tracing::debug!(order_id = %draft.order_id, reference = %reference, "Manual proof reference issued");
        Ok(Initiation {
            reference: Some(reference),
            // Awaiting confirmation only once a proof is uploaded
            attempt_status: AttemptStatus::Initiated,
            redirect_url: None,
        })
    }
}

/// Calculate SHA256 hash of data
fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Validate an uploaded proof image and describe it
///
/// The content type comes from the file extension; a declared type that is
/// not an image is rejected as well.
pub fn describe_proof(
    file_name: &str,
    declared_type: Option<&str>,
    data: &[u8],
) -> CommerceResult<ProofUpload> {
    if data.is_empty() {
        return Err(CommerceError::Validation("Empty file provided".into()));
    }
    if data.len() > MAX_PROOF_SIZE {
        return Err(CommerceError::Validation(format!(
            "File too large. Maximum size is {}MB",
            MAX_PROOF_SIZE / 1024 / 1024
        )));
    }

    let ext = PathBuf::from(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| {
            CommerceError::Validation(format!("Invalid file extension for: {}", file_name))
        })?;
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(CommerceError::Validation(format!(
            "Unsupported file format '{}'. Supported: {}",
            ext,
            SUPPORTED_FORMATS.join(", ")
        )));
    }
    if let Some(declared) = declared_type
        && !declared.starts_with("image/")
    {
        return Err(CommerceError::Validation(format!(
            "Proof must be an image, got {}",
            declared
        )));
    }

    let content_type = mime_guess::from_ext(&ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(ProofUpload {
        file_name: file_name.to_string(),
        content_type,
        size_bytes: data.len() as u64,
        sha256: calculate_hash(data),
        uploaded_at: shared::util::now_millis(),
    })
}

/// Where proof images go; the order only keeps [`ProofUpload`] metadata
#[async_trait]
pub trait ProofStore: Send + Sync {
    async fn save(&self, order_id: &str, proof: &ProofUpload, data: &[u8]) -> CommerceResult<()>;
}

/// Files under `{proofs_dir}/{order_id}/{sha256}.{ext}`
#[derive(Debug, Clone)]
pub struct LocalProofStore {
    root: PathBuf,
}

impl LocalProofStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, order_id: &str, proof: &ProofUpload) -> PathBuf {
        let ext = mime_guess::get_mime_extensions_str(&proof.content_type)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("bin");
        self.root
            .join(order_id)
            .join(format!("{}.{}", proof.sha256, ext))
    }
}

#[async_trait]
impl ProofStore for LocalProofStore {
    async fn save(&self, order_id: &str, proof: &ProofUpload, data: &[u8]) -> CommerceResult<()> {
        let path = self.path_for(order_id, proof);
        let io_err = |e: std::io::Error| CommerceError::ProofStorage(e.to_string());
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, data).await.map_err(io_err)?;
        tracing::info!(order_id = %order_id, path = %path.display(), size = data.len(), "Payment proof stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let r = ManualProofStrategy::new_reference();
        assert!(r.starts_with("MP-"));
        assert_eq!(r.len(), 3 + 32);
    }

    #[test]
    fn test_describe_proof_hashes_and_types() {
        let proof = describe_proof("receipt.PNG", Some("image/png"), b"fake-png").unwrap();
        assert_eq!(proof.content_type, "image/png");
        assert_eq!(proof.size_bytes, 8);
        assert_eq!(proof.sha256.len(), 64);
        assert_eq!(proof.sha256, calculate_hash(b"fake-png"));
    }

    #[test]
    fn test_describe_proof_rejects_bad_uploads() {
        assert!(describe_proof("receipt.png", None, b"").is_err());
        assert!(describe_proof("receipt.pdf", None, b"x").is_err());
        assert!(describe_proof("receipt", None, b"x").is_err());
        assert!(describe_proof("receipt.jpg", Some("text/plain"), b"x").is_err());
        let big = vec![0u8; MAX_PROOF_SIZE + 1];
        assert!(describe_proof("receipt.jpg", None, &big).is_err());
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalProofStore::new(dir.path());
        let proof = describe_proof("r.jpg", None, b"jpeg-bytes").unwrap();
        store.save("o-1", &proof, b"jpeg-bytes").await.unwrap();

        let path = store.path_for("o-1", &proof);
        assert!(path.starts_with(dir.path().join("o-1")));
        assert_eq!(std::fs::read(path).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_initiate_waits_for_a_proof() {
        let draft = OrderDraft {
            order_id: "o-1".to_string(),
            user_id: "u1".to_string(),
            payment_method: PaymentMethod::ManualProof,
            shipping_info: Default::default(),
            items: vec![],
            totals: crate::orders::money::price_lines(
                std::iter::empty::<(rust_decimal::Decimal, u32)>(),
                &Default::default(),
            ),
        };
        let initiation = ManualProofStrategy.initiate(&draft).await.unwrap();
        assert_eq!(initiation.attempt_status, AttemptStatus::Initiated);
        assert!(initiation.reference.unwrap().starts_with("MP-"));
        assert!(initiation.redirect_url.is_none());
    }
}
