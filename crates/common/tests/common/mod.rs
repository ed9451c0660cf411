//! Shared test utilities for vault integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use ::common::store::{MemoryFileIndex, MemorySecretProvider, MemoryUserDirectory};
use ::common::vault::{Vault, VaultConfig};
use object_store::ObjectStore;
use tempfile::TempDir;

/// Smallest modulus that can carry a wrapped content key
pub const TEST_KEY_BITS: u64 = 512;

pub struct TestEnv {
    pub vault: Vault,
    pub users: Arc<MemoryUserDirectory>,
    pub secrets: Arc<MemorySecretProvider>,
    pub store: ObjectStore,
    pub temp_dir: TempDir,
}

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors RUST_LOG.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Set up a vault backed by a local object store in a fresh temp directory
pub async fn setup_test_env() -> TestEnv {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let store = ObjectStore::new_local(temp_dir.path()).await.unwrap();

    let users = Arc::new(MemoryUserDirectory::new());
    let secrets = Arc::new(MemorySecretProvider::new());
    let vault = Vault::new(
        users.clone(),
        Arc::new(MemoryFileIndex::new()),
        secrets.clone(),
        Arc::new(store.clone()),
        VaultConfig {
            key_bits: TEST_KEY_BITS,
            concurrency: 3,
        },
    );

    TestEnv {
        vault,
        users,
        secrets,
        store,
        temp_dir,
    }
}
