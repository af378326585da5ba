//! # Credential Delegate Binding
//!
//! Each fabric admin owns one credential delegate, the service that issues
//! operational credentials for devices on its fabric. The service itself is
//! external and consumed through [`CredentialDelegate`]; what this module
//! pins down is ownership of the binding:
//!
//! - [`DelegateHandle`] is move-only and consumed by
//!   [`CredentialDelegate::release`], so a handle cannot be used or released
//!   after release.
//! - [`DelegateRef`] is a copyable, non-owning view handed to controllers.
//!
//! [`LocalCredentialDelegate`] is an in-process implementation that keeps an
//! Ed25519 root key per bound admin.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use shared::{
    error::{FabricError, FabricResult},
    types::AdminIndex,
};

/// Identifier of a bound delegate within its service
pub type DelegateId = u64;

/// External service issuing credentials on behalf of an admin
pub trait CredentialDelegate: Send + Sync {
    /// Bind a new delegate instance for `admin_index`
    fn bind(&self, admin_index: AdminIndex) -> FabricResult<DelegateHandle>;

    /// Release a bound delegate
    fn release(&self, handle: DelegateHandle) -> FabricResult<()>;
}

// =============================================================================
// HANDLES
// =============================================================================

/// Owned binding to a credential delegate
///
/// Dropping a handle without passing it to [`CredentialDelegate::release`]
/// leaks the external resource and is logged.
#[derive(Debug)]
pub struct DelegateHandle {
    id: DelegateId,
    admin_index: AdminIndex,
    armed: bool,
}

impl DelegateHandle {
    /// Create a handle; only delegate services should call this
    pub fn new(id: DelegateId, admin_index: AdminIndex) -> Self {
        Self {
            id,
            admin_index,
            armed: true,
        }
    }

    /// Service-side identifier
    pub fn id(&self) -> DelegateId {
        self.id
    }

    /// Admin index the delegate was bound for
    pub fn admin_index(&self) -> AdminIndex {
        self.admin_index
    }

    /// Non-owning view of this handle
    pub fn delegate_ref(&self) -> DelegateRef {
        DelegateRef {
            id: self.id,
            admin_index: self.admin_index,
        }
    }

    /// Consume the handle, returning its identifier
    ///
    /// Called by services while releasing the underlying resource.
    pub fn into_id(mut self) -> DelegateId {
        self.armed = false;
        self.id
    }
}

impl Drop for DelegateHandle {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                delegate_id = self.id,
                admin_index = self.admin_index,
                "Credential delegate handle dropped without release"
            );
        }
    }
}

/// Non-owning reference to a bound delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateRef {
    id: DelegateId,
    admin_index: AdminIndex,
}

impl DelegateRef {
    /// Service-side identifier
    pub fn id(&self) -> DelegateId {
        self.id
    }

    /// Admin index the delegate was bound for
    pub fn admin_index(&self) -> AdminIndex {
        self.admin_index
    }
}

// =============================================================================
// LOCAL DELEGATE
// =============================================================================

/// Root signing material held for one bound admin
struct LocalIssuer {
    admin_index: AdminIndex,
    root_key: SigningKey,
}

/// In-process credential delegate with one Ed25519 root key per binding
pub struct LocalCredentialDelegate {
    next_id: AtomicU64,
    issuers: Mutex<HashMap<DelegateId, LocalIssuer>>,
}

impl LocalCredentialDelegate {
    /// Create a delegate service with no bindings
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            issuers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of bindings not yet released
    pub fn live_handles(&self) -> usize {
        self.issuers.lock().len()
    }

    /// Root public key (hex) of a bound delegate
    pub fn root_public_key_hex(&self, delegate: DelegateRef) -> Option<String> {
        self.issuers
            .lock()
            .get(&delegate.id)
            .map(|issuer| hex::encode(issuer.root_key.verifying_key().as_bytes()))
    }

    /// Sign `message` with the root key of a bound delegate
    pub fn sign(&self, delegate: DelegateRef, message: &[u8]) -> FabricResult<Vec<u8>> {
        let issuers = self.issuers.lock();
        let issuer = issuers.get(&delegate.id).ok_or_else(|| {
            FabricError::InternalError(format!(
                "credential delegate {} is not bound",
                delegate.id
            ))
        })?;

        Ok(issuer.root_key.sign(message).to_bytes().to_vec())
    }

    /// Root verifying key of a bound delegate
    pub fn verifying_key(&self, delegate: DelegateRef) -> Option<VerifyingKey> {
        self.issuers
            .lock()
            .get(&delegate.id)
            .map(|issuer| issuer.root_key.verifying_key())
    }
}

impl Default for LocalCredentialDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialDelegate for LocalCredentialDelegate {
    fn bind(&self, admin_index: AdminIndex) -> FabricResult<DelegateHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let root_key = SigningKey::generate(&mut rand::thread_rng());

        debug!(
            delegate_id = id,
            admin_index,
            root_public_key = %hex::encode(root_key.verifying_key().as_bytes()),
            "Generated root key for credential delegate"
        );

        self.issuers
            .lock()
            .insert(id, LocalIssuer { admin_index, root_key });

        info!(delegate_id = id, admin_index, "Credential delegate bound");
        Ok(DelegateHandle::new(id, admin_index))
    }

    fn release(&self, handle: DelegateHandle) -> FabricResult<()> {
        let admin_index = handle.admin_index();
        let id = handle.into_id();

        match self.issuers.lock().remove(&id) {
            Some(issuer) => {
                info!(delegate_id = id, admin_index = issuer.admin_index, "Credential delegate released");
                Ok(())
            }
            None => Err(FabricError::ResourceReleaseError {
                admin_index,
                reason: format!("credential delegate {} is not bound by this service", id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn test_bind_and_release() {
        let delegates = LocalCredentialDelegate::new();

        let handle = delegates.bind(3).unwrap();
        assert_eq!(handle.admin_index(), 3);
        assert_eq!(delegates.live_handles(), 1);

        delegates.release(handle).unwrap();
        assert_eq!(delegates.live_handles(), 0);
    }

    #[test]
    fn test_each_binding_gets_its_own_root_key() {
        let delegates = LocalCredentialDelegate::new();
        let first = delegates.bind(1).unwrap();
        let second = delegates.bind(1).unwrap();

        assert_ne!(first.id(), second.id());
        let first_key = delegates.root_public_key_hex(first.delegate_ref()).unwrap();
        let second_key = delegates.root_public_key_hex(second.delegate_ref()).unwrap();
        assert_eq!(first_key.len(), 64);
        assert_ne!(first_key, second_key);

        delegates.release(first).unwrap();
        delegates.release(second).unwrap();
    }

    #[test]
    fn test_released_delegate_is_unusable() {
        let delegates = LocalCredentialDelegate::new();
        let handle = delegates.bind(1).unwrap();
        let delegate = handle.delegate_ref();

        delegates.release(handle).unwrap();

        assert!(delegates.root_public_key_hex(delegate).is_none());
        assert!(delegates.sign(delegate, b"node").is_err());
    }

    #[test]
    fn test_foreign_handle_release_fails() {
        let ours = LocalCredentialDelegate::new();
        let theirs = LocalCredentialDelegate::new();

        let handle = theirs.bind(1).unwrap();
        let foreign = DelegateHandle::new(handle.id() + 100, 7);

        let err = ours.release(foreign).unwrap_err();
        assert!(matches!(
            err,
            FabricError::ResourceReleaseError { admin_index: 7, .. }
        ));

        theirs.release(handle).unwrap();
    }

    #[test]
    fn test_signature_verifies_with_root_key() {
        let delegates = LocalCredentialDelegate::new();
        let handle = delegates.bind(2).unwrap();
        let delegate = handle.delegate_ref();

        let signature = delegates.sign(delegate, b"node 112233").unwrap();
        let signature = Signature::from_slice(&signature).unwrap();
        let key = delegates.verifying_key(delegate).unwrap();
        assert!(key.verify(b"node 112233", &signature).is_ok());

        delegates.release(handle).unwrap();
    }

    #[test]
    fn test_delegate_ref_matches_handle() {
        let handle = DelegateHandle::new(9, 4);
        let delegate = handle.delegate_ref();
        assert_eq!(delegate.id(), 9);
        assert_eq!(delegate.admin_index(), 4);
        assert_eq!(handle.into_id(), 9);
    }
}
