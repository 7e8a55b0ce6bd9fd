//! Test database utilities

use anyhow::Result;
use futures_holdings::database::HoldingsStore;
use tempfile::TempDir;

/// Open a completely fresh store in a temporary directory.
///
/// The TempDir must be kept alive for the lifetime of the store.
pub async fn init_fresh_store() -> Result<(HoldingsStore, TempDir)> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test_holdings.db");
    let store = HoldingsStore::new(db_path.to_str().unwrap()).await?;
    Ok((store, dir))
}
