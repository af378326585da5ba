//! # Controllers
//!
//! A controller is an identity vended by a [`FabricAdmin`] on its fabric,
//! used to manage devices there. It refers to the admin's credential
//! delegate without owning it; the reference is only meaningful while the
//! admin is active.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use shared::types::{AdminIndex, FabricId, NodeId, VendorId};

use crate::admin::FabricAdmin;
use crate::delegate::DelegateRef;

/// Options for [`FabricAdmin::new_controller`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Node ID to use; taken from the admin's counter when `None`
    pub node_id: Option<NodeId>,

    /// Directory of PAA trust anchors used for device attestation
    pub paa_trust_store_path: Option<PathBuf>,

    /// Use the test commissioner
    pub use_test_commissioner: bool,
}

impl ControllerOptions {
    /// Use an explicit node ID
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Set the PAA trust store directory
    pub fn with_paa_trust_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paa_trust_store_path = Some(path.into());
        self
    }

    /// Enable the test commissioner
    pub fn with_test_commissioner(mut self, enabled: bool) -> Self {
        self.use_test_commissioner = enabled;
        self
    }
}

/// Controller identity on an admin's fabric
#[derive(Debug, Clone)]
pub struct Controller {
    node_id: NodeId,
    fabric_id: FabricId,
    vendor_id: VendorId,
    admin_index: AdminIndex,
    paa_trust_store_path: Option<PathBuf>,
    use_test_commissioner: bool,
    delegate: DelegateRef,
    admin: Weak<FabricAdmin>,
}

impl Controller {
    pub(crate) fn new(
        admin: &Arc<FabricAdmin>,
        delegate: DelegateRef,
        node_id: NodeId,
        options: ControllerOptions,
    ) -> Self {
        Self {
            node_id,
            fabric_id: admin.fabric_id(),
            vendor_id: admin.vendor_id(),
            admin_index: admin.admin_index(),
            paa_trust_store_path: options.paa_trust_store_path,
            use_test_commissioner: options.use_test_commissioner,
            delegate,
            admin: Arc::downgrade(admin),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn fabric_id(&self) -> FabricId {
        self.fabric_id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn admin_index(&self) -> AdminIndex {
        self.admin_index
    }

    pub fn paa_trust_store_path(&self) -> Option<&Path> {
        self.paa_trust_store_path.as_deref()
    }

    pub fn use_test_commissioner(&self) -> bool {
        self.use_test_commissioner
    }

    /// Credential delegate the controller issues through
    pub fn delegate(&self) -> DelegateRef {
        self.delegate
    }

    /// The vending admin, if still alive
    pub fn admin(&self) -> Option<Arc<FabricAdmin>> {
        self.admin.upgrade()
    }

    /// Whether the vending admin is alive, active and still owns the delegate
    pub fn is_bound(&self) -> bool {
        self.admin
            .upgrade()
            .and_then(|admin| admin.delegate_ref())
            .is_some_and(|delegate| delegate == self.delegate)
    }
}
