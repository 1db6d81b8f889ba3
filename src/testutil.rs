//! Shared test helpers for router-level tests.

use std::sync::Arc;

use crate::accounts::UserDirectory;
use crate::config::{
    AuthConfig, Config, GatewayConfig, NodeConfig, ServiceRole, SigningKey, StorageConfig,
};
use crate::file_store::FileStore;
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::tokens::TokenAuthority;
use crate::{AuthState, StorageState};

pub struct TestServices {
    pub auth: Arc<AuthState>,
    pub storage: Arc<StorageState>,
}

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        role: ServiceRole::Standalone,
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            content_root: temp_dir.path().join("files").to_string_lossy().to_string(),
        },
        auth: AuthConfig {
            signing_key: SigningKey {
                id: "test".to_string(),
                secret: b"0123456789abcdef0123456789abcdef".to_vec(),
            },
            previous_signing_keys: vec![],
            token_ttl_secs: 3600,
            issuer: "filebox-test".to_string(),
            secure_cookies: true,
        },
        gateway: GatewayConfig::default(),
        max_upload_size: 1024 * 1024, // 1MB for tests
    }
}

/// Auth and storage states over one temporary database and content root.
pub fn test_services(temp_dir: &tempfile::TempDir) -> TestServices {
    let config = test_config(temp_dir);

    let db = Database::open(&config.node.data_dir).expect("Failed to open test database");
    let content =
        LocalStore::new(&config.storage.content_root).expect("Failed to create test content store");
    let tokens = TokenAuthority::new(&config.auth);
    let files = FileStore::new(db.clone(), Arc::new(content));

    let auth = Arc::new(AuthState {
        config: config.clone(),
        accounts: UserDirectory::new(db),
        tokens: tokens.clone(),
    });
    let storage = Arc::new(StorageState {
        config,
        shares: files.share_resolver(),
        files,
        tokens,
    });

    TestServices { auth, storage }
}
