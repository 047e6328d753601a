//! Registry of connection handles, keyed by database identifier.
//!
//! The application owns one registry, registers every handle it creates and
//! calls [`Registry::close_all`] on its way out.

use crate::db::database::Database;
use crate::db::driver::{Driver, FaultLayer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct Registry<D: Driver> {
    databases: Arc<RwLock<HashMap<String, Arc<Database<D>>>>>,
}

impl<D: Driver> Registry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handle under its database identifier.
    ///
    /// A handle already registered under the same identifier is replaced
    /// silently; it is not closed.
    pub async fn register(&self, database: Database<D>) -> Arc<Database<D>> {
        let database = Arc::new(database);
        let name = database.name().to_string();

        let previous = {
            let mut databases = self.databases.write().await;
            databases.insert(name.clone(), Arc::clone(&database))
        };

        if previous.is_some() {
            debug!(database = %name, "Replaced registered database handle");
        } else {
            debug!(database = %name, "Registered database handle");
        }
        database
    }

    /// Get a registered handle.
    pub async fn get(&self, name: &str) -> Option<Arc<Database<D>>> {
        let databases = self.databases.read().await;
        databases.get(name).cloned()
    }

    /// List registered database identifiers.
    pub async fn names(&self) -> Vec<String> {
        let databases = self.databases.read().await;
        databases.keys().cloned().collect()
    }

    /// Get the number of registered handles.
    pub async fn len(&self) -> usize {
        let databases = self.databases.read().await;
        databases.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every held connection.
    ///
    /// Closing a connection that is already closed is a silent no-op, so this
    /// can run more than once. Returns the number of connections closed.
    pub async fn close_all(&self) -> usize {
        // Snapshot handles so the map lock is not held across network I/O
        let handles: Vec<Arc<Database<D>>> = {
            let databases = self.databases.read().await;
            databases.values().cloned().collect()
        };

        let mut closed = 0;
        for database in handles {
            match database.close().await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(fault) if fault.layer() == FaultLayer::Interface => {}
                Err(fault) => {
                    warn!(
                        database = %database.name(),
                        error = %fault,
                        "Failed to close connection"
                    );
                }
            }
        }

        if closed > 0 {
            info!(closed = closed, "Closed database connections");
        }
        closed
    }
}

impl<D: Driver> Clone for Registry<D> {
    fn clone(&self) -> Self {
        Self {
            databases: Arc::clone(&self.databases),
        }
    }
}

impl<D: Driver> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> std::fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
