//! Entry point wiring one transport into the three resource services.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::http::{HttpExecutor, ReqwestExecutor};
use crate::service::{FloodAlertService, PersonService, RiverAddressService};
use crate::session::Session;
use crate::storage::{FileSlot, KeyValueSlot, SESSION_KEY};
use crate::transport::Transport;

/// Client for the Follow Rivers API.
///
/// Cheap to clone; every service shares the same transport.
#[derive(Debug, Clone)]
pub struct FollowRivers {
    config: ClientConfig,
    transport: Transport,
    persons: PersonService,
    river_addresses: RiverAddressService,
    flood_alerts: FloodAlertService,
}

impl FollowRivers {
    /// Client talking to the network through `reqwest`.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_executor(config, Arc::new(ReqwestExecutor::new()))
    }

    pub fn with_executor(config: ClientConfig, executor: Arc<dyn HttpExecutor>) -> Self {
        let transport = Transport::new(&config.base_url, executor);
        Self {
            persons: PersonService::new(transport.clone()),
            river_addresses: RiverAddressService::new(transport.clone()),
            flood_alerts: FloodAlertService::new(transport.clone()),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn persons(&self) -> &PersonService {
        &self.persons
    }

    pub fn river_addresses(&self) -> &RiverAddressService {
        &self.river_addresses
    }

    pub fn flood_alerts(&self) -> &FloodAlertService {
        &self.flood_alerts
    }

    /// The durable slot for this client's session, under `storage_dir`.
    pub fn session_slot(&self) -> FileSlot {
        FileSlot::new(&self.config.storage_dir, SESSION_KEY)
    }

    /// Starts the session backed by [`FollowRivers::session_slot`].
    pub async fn open_session(&self) -> Session {
        self.open_session_with(Arc::new(self.session_slot())).await
    }

    pub async fn open_session_with(&self, slot: Arc<dyn KeyValueSlot>) -> Session {
        Session::start(self.persons.clone(), slot).await
    }
}
