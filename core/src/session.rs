//! Signed-in user session.
//!
//! # Design
//! A `Session` is created once per process and handed to whatever needs the
//! current user. It caches the authenticated person's envelope in memory and
//! in a durable [`KeyValueSlot`]. Start-up restore and background refresh are
//! best-effort: their failures are logged and leave the session usable.
//! Everything else propagates errors to the caller unchanged.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::credentials::{CredentialVerifier, StoredSecretVerifier};
use crate::error::{display_message, ApiError};
use crate::links::ResourceEnvelope;
use crate::service::PersonService;
use crate::storage::KeyValueSlot;
use crate::types::{Person, PersonPayload};

pub type PersonResource = ResourceEnvelope<Person>;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The durable slot has not been read yet.
    Initializing,
    /// Restore finished; the session may or may not hold a user.
    Ready,
    /// Restore failed; the session starts signed out.
    Failed,
}

/// Snapshot of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub resource: Option<PersonResource>,
    pub loading: bool,
    pub initializing: bool,
}

#[derive(Debug)]
struct Inner {
    resource: Option<PersonResource>,
    loading: bool,
    phase: SessionPhase,
}

pub struct Session {
    persons: PersonService,
    slot: Arc<dyn KeyValueSlot>,
    verifier: Arc<dyn CredentialVerifier>,
    inner: RwLock<Inner>,
}

impl Session {
    /// A session that has not read its durable slot yet.
    pub fn new(persons: PersonService, slot: Arc<dyn KeyValueSlot>) -> Self {
        Self {
            persons,
            slot,
            verifier: Arc::new(StoredSecretVerifier),
            inner: RwLock::new(Inner {
                resource: None,
                loading: false,
                phase: SessionPhase::Initializing,
            }),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Creates the session and restores it from the durable slot.
    pub async fn start(persons: PersonService, slot: Arc<dyn KeyValueSlot>) -> Self {
        let session = Self::new(persons, slot);
        session.restore().await;
        session
    }

    /// Reads the durable slot once. Never fails: problems are logged and the
    /// session is left signed out.
    pub async fn restore(&self) {
        let restored = match self.slot.load().await {
            Ok(Some(raw)) if raw.trim().is_empty() => Ok(None),
            Ok(Some(raw)) => serde_json::from_str::<PersonResource>(&raw)
                .map(Some)
                .map_err(|e| e.to_string()),
            Ok(None) => Ok(None),
            Err(e) => Err(e.to_string()),
        };

        let mut inner = self.inner.write().await;
        match restored {
            Ok(resource) => {
                debug!(restored = resource.is_some(), "session restored");
                inner.resource = resource;
                inner.phase = SessionPhase::Ready;
            }
            Err(e) => {
                error!(error = %e, "could not load the saved session");
                inner.resource = None;
                inner.phase = SessionPhase::Failed;
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        let inner = self.inner.read().await;
        SessionState {
            resource: inner.resource.clone(),
            loading: inner.loading,
            initializing: inner.phase == SessionPhase::Initializing,
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.read().await.phase
    }

    pub async fn resource(&self) -> Option<PersonResource> {
        self.inner.read().await.resource.clone()
    }

    pub async fn person(&self) -> Option<Person> {
        self.inner.read().await.resource.as_ref().map(|r| r.data.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.resource.is_some()
    }

    pub async fn login(&self, email: &str, senha: &str, cancel: &CancelToken) -> Result<(), ApiError> {
        let resource = self
            .loading(self.persons.authenticate_with(self.verifier.as_ref(), email, senha, cancel))
            .await?;
        info!(person_id = resource.data.id, "signed in");
        self.store(resource).await
    }

    pub async fn register(&self, payload: &PersonPayload, cancel: &CancelToken) -> Result<(), ApiError> {
        let resource = self.loading(self.persons.create(payload, cancel)).await?;
        info!(person_id = resource.data.id, "registered");
        self.store(resource).await
    }

    /// Updates the signed-in person and returns the refreshed resource.
    pub async fn update_profile(
        &self,
        payload: &PersonPayload,
        cancel: &CancelToken,
    ) -> Result<PersonResource, ApiError> {
        let current = self
            .resource()
            .await
            .ok_or_else(|| ApiError::Precondition("no authenticated user".to_string()))?;

        let updated = self
            .loading(self.persons.update(&current, payload, cancel))
            .await?;
        self.store(updated.clone()).await?;
        Ok(updated)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        inner.resource = None;
        self.slot.clear().await?;
        info!("signed out");
        Ok(())
    }

    /// Re-reads the signed-in person. On failure the current state is kept
    /// and a warning is logged. The result is dropped if the session no
    /// longer holds the same person once the response arrives.
    pub async fn refresh(&self, cancel: &CancelToken) {
        let Some(current) = self.resource().await else {
            return;
        };
        let id = current.data.id;

        match self.persons.get(id, cancel).await {
            Ok(fresh) => {
                let mut inner = self.inner.write().await;
                if inner.resource.as_ref().map(|r| r.data.id) != Some(id) {
                    debug!(person_id = id, "session changed during refresh, dropping result");
                    return;
                }
                if let Err(e) = self.persist(&mut inner, fresh).await {
                    warn!(error = %e, "refreshed user could not be saved");
                }
            }
            Err(e) => {
                warn!(error = %display_message(&e), "could not refresh the signed-in user");
            }
        }
    }

    async fn store(&self, resource: PersonResource) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        self.persist(&mut inner, resource).await
    }

    /// Writes the durable slot, then memory. A failed save leaves both as
    /// they were.
    async fn persist(&self, inner: &mut Inner, resource: PersonResource) -> Result<(), ApiError> {
        let raw = serde_json::to_string(&resource).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.slot.save(&raw).await?;
        inner.resource = Some(resource);
        Ok(())
    }

    async fn loading<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.inner.write().await.loading = true;
        let result = fut.await;
        self.inner.write().await.loading = false;
        result
    }
}
