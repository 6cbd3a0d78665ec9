//! Connection management for MongoDB
//!
//! This module provides connection management functionality including:
//! - Connection establishment with retry and ping verification
//! - Connection pool settings taken from configuration
//! - Connection termination

use mongodb::bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// Base delay between connection attempts, doubled on each retry
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// MongoDB connection manager
///
/// Owns the driver client and is handed to the executor explicitly.
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Current connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Connection URI
    uri: String,

    /// Database used for unqualified operations
    database: String,
}

/// Connection state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Currently connecting
    Connecting,

    /// Connected and ready
    Connected,

    /// Connection failed
    Failed(String),
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `config` - Connection configuration
    ///
    /// # Returns
    /// * `Self` - New connection manager instance
    pub fn new(uri: String, config: ConnectionConfig) -> Self {
        let database = config.database.clone();
        Self {
            client: None,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            uri,
            database,
        }
    }

    /// Establish connection to MongoDB
    ///
    /// The database named in the URI, if any, replaces the configured one.
    ///
    /// # Returns
    /// * `Result<()>` - Success or connection error
    pub async fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting).await;

        let options = match Self::parse_uri(&self.uri).await {
            Ok(options) => options,
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                return Err(e);
            }
        };
        if let Some(db) = options.default_database.clone() {
            self.database = db;
        }

        let options = self.configure_pool(options);
        match self.connect_with_retry(options).await {
            Ok(client) => {
                self.client = Some(client);
                self.set_state(ConnectionState::Connected).await;
                info!("Connected to MongoDB, database '{}'", self.database);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Disconnect from MongoDB
    ///
    /// Closes all connections and cleans up resources
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("Disconnected from MongoDB");
        }
        self.set_state(ConnectionState::Disconnected).await;
        Ok(())
    }

    /// Get a database handle
    ///
    /// # Arguments
    /// * `name` - Database name
    ///
    /// # Returns
    /// * `Result<Database>` - Database handle or error
    pub fn get_database(&self, name: &str) -> Result<Database> {
        Ok(self.get_client()?.database(name))
    }

    /// Handle to the configured (or URI-selected) database
    pub fn default_database(&self) -> Result<Database> {
        self.get_database(&self.database)
    }

    /// Name of the database used for unqualified operations
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Override the database used for unqualified operations
    pub fn set_database(&mut self, name: impl Into<String>) {
        self.database = name.into();
    }

    /// Get the MongoDB client
    ///
    /// # Returns
    /// * `Result<&Client>` - Reference to client or error
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Get current connection state
    pub async fn get_state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Check if currently connected
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected)
    }

    /// Parse connection URI and create client options
    async fn parse_uri(uri: &str) -> Result<ClientOptions> {
        ClientOptions::parse(uri)
            .await
            .map_err(|e| ConnectionError::InvalidUri(e.to_string()).into())
    }

    /// Configure client options with pool settings
    ///
    /// Values already present in the URI take precedence.
    fn configure_pool(&self, mut options: ClientOptions) -> ClientOptions {
        let timeout = Duration::from_secs(self.config.timeout);

        options.max_pool_size.get_or_insert(self.config.max_pool_size);
        options.min_pool_size.get_or_insert(self.config.min_pool_size);
        options
            .max_idle_time
            .get_or_insert(Duration::from_secs(self.config.idle_timeout));
        options.connect_timeout.get_or_insert(timeout);
        options.server_selection_timeout.get_or_insert(timeout);
        options
            .app_name
            .get_or_insert_with(|| self.config.app_name.clone());

        options
    }

    /// Update connection state
    async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    /// Attempt connection with retries
    ///
    /// Makes `retry_attempts + 1` attempts in total, backing off
    /// exponentially between them.
    async fn connect_with_retry(&self, options: ClientOptions) -> Result<Client> {
        let attempts = self.config.retry_attempts + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::try_connect(options.clone()).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                        warn!(
                            "Connection attempt {}/{} failed: {}; retrying in {:?}",
                            attempt, attempts, last_error, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ConnectionError::ConnectionFailed(last_error).into())
    }

    /// Create a client and verify it with a ping
    async fn try_connect(options: ClientOptions) -> Result<Client> {
        let client = Client::with_options(options)
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        Self::ping(&client).await?;
        Ok(client)
    }

    /// Verify connection is alive by sending a ping
    async fn ping(client: &Client) -> Result<()> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConnectionError::PingFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[test]
    fn test_connection_state() {
        let state = ConnectionState::Disconnected;
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_new_manager_is_disconnected() {
        let manager = ConnectionManager::new(
            "mongodb://localhost:27017".to_string(),
            ConnectionConfig::default(),
        );
        assert!(!manager.is_connected().await);
        assert_eq!(manager.get_state().await, ConnectionState::Disconnected);
        assert_eq!(manager.database_name(), "test");
    }

    #[test]
    fn test_client_requires_connection() {
        let manager = ConnectionManager::new(
            "mongodb://localhost:27017".to_string(),
            ConnectionConfig::default(),
        );
        assert!(matches!(
            manager.get_client(),
            Err(QueryError::Connection(ConnectionError::NotConnected))
        ));
        assert!(manager.default_database().is_err());
    }

    #[tokio::test]
    async fn test_invalid_uri_marks_failure() {
        let mut manager =
            ConnectionManager::new("localhost:27017".to_string(), ConnectionConfig::default());
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Connection(ConnectionError::InvalidUri(_))
        ));
        assert!(matches!(manager.get_state().await, ConnectionState::Failed(_)));
    }

    #[tokio::test]
    async fn test_configure_pool_fills_unset_values() {
        let config = ConnectionConfig {
            max_pool_size: 25,
            app_name: "reports".to_string(),
            ..Default::default()
        };
        let manager = ConnectionManager::new("mongodb://localhost".to_string(), config);

        let options = ClientOptions::parse("mongodb://localhost/?minPoolSize=1")
            .await
            .unwrap();
        let options = manager.configure_pool(options);

        assert_eq!(options.max_pool_size, Some(25));
        assert_eq!(options.min_pool_size, Some(1));
        assert_eq!(options.app_name.as_deref(), Some("reports"));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_disconnect_without_client() {
        let mut manager = ConnectionManager::new(
            "mongodb://localhost".to_string(),
            ConnectionConfig::default(),
        );
        manager.disconnect().await.unwrap();
        assert_eq!(manager.get_state().await, ConnectionState::Disconnected);
    }
}
