//! # Fabric Admin CLI
//!
//! Command-line tool for managing persisted fabric admins:
//! - Create an admin and vend controllers on its fabric
//! - List the persisted admin table
//! - Restore an admin from its persisted record
//! - Remove an admin and its persisted record
//!
//! ## Usage
//!
//! ```bash
//! # Create an admin for vendor 0xFFF1 on fabric 0xAA and vend two controllers
//! fabric-admin create --vendor-id 0xFFF1 --fabric-id 0xAA --controllers 2
//!
//! # Show persisted admins
//! fabric-admin list
//!
//! # Re-create admin 1 from storage
//! fabric-admin restore --admin-index 1 --controllers 1
//!
//! # Delete admin 1 from storage
//! fabric-admin remove --admin-index 1
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fabric_admin::{
    AdminParams, AdminRegistry, ControllerOptions, FabricAdmin, JsonFileStore,
    LocalCredentialDelegate,
};
use shared::{
    config::FabricAdminConfig,
    constants::parse_id,
    types::{AdminIndex, FabricId, VendorId},
};

#[derive(Parser)]
#[command(name = "fabric-admin")]
#[command(about = "Manage fabric admins and vend controllers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the storage file
    #[arg(long, global = true)]
    data_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new fabric admin and persist it
    Create {
        /// Vendor ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_vendor_id)]
        vendor_id: Option<VendorId>,

        /// Admin index to claim (allocated when omitted)
        #[arg(long)]
        admin_index: Option<AdminIndex>,

        /// Fabric ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_fabric_id)]
        fabric_id: Option<FabricId>,

        #[command(flatten)]
        vend: VendArgs,
    },

    /// List persisted fabric admins
    List,

    /// Re-create a fabric admin from its persisted record
    Restore {
        /// Admin index to restore
        #[arg(long)]
        admin_index: AdminIndex,

        #[command(flatten)]
        vend: VendArgs,
    },

    /// Remove a fabric admin and delete its persisted record
    Remove {
        /// Admin index to remove
        #[arg(long)]
        admin_index: AdminIndex,
    },
}

#[derive(clap::Args)]
struct VendArgs {
    /// Number of controllers to vend
    #[arg(long, short = 'c', default_value_t = 0)]
    controllers: usize,

    /// PAA trust store directory for vended controllers
    #[arg(long)]
    paa_trust_store_path: Option<PathBuf>,

    /// Vend controllers using the test commissioner
    #[arg(long)]
    test_commissioner: bool,
}

fn parse_vendor_id(value: &str) -> Result<VendorId, String> {
    parse_id(value)
        .and_then(|id| VendorId::try_from(id).ok())
        .ok_or_else(|| format!("invalid vendor ID '{}'", value))
}

fn parse_fabric_id(value: &str) -> Result<FabricId, String> {
    parse_id(value).ok_or_else(|| format!("invalid fabric ID '{}'", value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Version: {}", shared::VERSION);

    // Load configuration
    let mut config = FabricAdminConfig::from_env()?;
    if let Some(data_path) = cli.data_path {
        config.storage.data_path = data_path;
    }
    config.validate()?;

    info!(path = ?config.storage.file_path(), "Configuration loaded");

    let store = Arc::new(JsonFileStore::open(config.storage.file_path())?);
    let delegates = Arc::new(LocalCredentialDelegate::new());
    let registry = AdminRegistry::new(store, delegates.clone());

    let result = match cli.command {
        Commands::Create {
            vendor_id,
            admin_index,
            fabric_id,
            vend,
        } => {
            let params = AdminParams {
                vendor_id: vendor_id.or(config.default_vendor_id),
                admin_index,
                fabric_id: fabric_id.unwrap_or(config.default_fabric_id),
            };
            FabricAdmin::create(&registry, params)
                .map_err(anyhow::Error::from)
                .and_then(|admin| run_admin(&admin, &delegates, &vend, false))
        }
        Commands::List => list_admins(&registry),
        Commands::Restore { admin_index, vend } => FabricAdmin::restore(&registry, admin_index)
            .map_err(anyhow::Error::from)
            .and_then(|admin| run_admin(&admin, &delegates, &vend, false)),
        Commands::Remove { admin_index } => {
            let vend = VendArgs {
                controllers: 0,
                paa_trust_store_path: None,
                test_commissioner: false,
            };
            FabricAdmin::restore(&registry, admin_index)
                .map_err(anyhow::Error::from)
                .and_then(|admin| run_admin(&admin, &delegates, &vend, true))
        }
    };

    let shutdown = registry.shutdown_all();
    result?;
    shutdown?;
    registry.ensure_drained()?;

    Ok(())
}

fn run_admin(
    admin: &Arc<FabricAdmin>,
    delegates: &LocalCredentialDelegate,
    vend: &VendArgs,
    delete_from_storage: bool,
) -> Result<()> {
    println!("\nFabric admin {}:", admin.admin_index());
    println!("  Fabric ID: 0x{:016X}", admin.fabric_id());
    println!("  Vendor ID: 0x{:04X}", admin.vendor_id());
    if let Some(root_key) = admin
        .delegate_ref()
        .and_then(|delegate| delegates.root_public_key_hex(delegate))
    {
        println!("  Root public key: {}", root_key);
    }

    // Shut down even when vending fails so the delegate is released
    let vended = vend_controllers(admin, vend);
    let shutdown = admin.shutdown(delete_from_storage);
    vended?;
    shutdown?;

    if delete_from_storage {
        println!("\n✓ Fabric admin {} removed", admin.admin_index());
    } else {
        println!("\n✓ Fabric admin {} persisted", admin.admin_index());
    }
    Ok(())
}

fn vend_controllers(admin: &Arc<FabricAdmin>, vend: &VendArgs) -> Result<()> {
    let mut options = ControllerOptions::default().with_test_commissioner(vend.test_commissioner);
    if let Some(ref path) = vend.paa_trust_store_path {
        options = options.with_paa_trust_store_path(path.clone());
    }

    for _ in 0..vend.controllers {
        let controller = admin.new_controller(options.clone())?;
        println!("  Controller node ID: 0x{:016X}", controller.node_id());
    }
    Ok(())
}

fn list_admins(registry: &AdminRegistry) -> Result<()> {
    let table = registry.persisted_admins()?;

    if table.is_empty() {
        println!("\nNo persisted fabric admins.");
        println!("Run 'fabric-admin create --vendor-id <ID>' to create one.");
        return Ok(());
    }

    println!("\nPersisted fabric admins:");
    for (admin_index, record) in table.entries() {
        println!(
            "  [{}] Fabric ID: 0x{:016X}  Vendor ID: 0x{:04X}",
            admin_index, record.fabric_id, record.vendor_id
        );
    }

    Ok(())
}
