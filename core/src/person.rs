//! Person-specific operations: lookup by email, sign-in, password reset.
//!
//! Email lookup walks the whole collection page by page following `next`
//! links, one request at a time. That is linear in the collection size and
//! only reasonable while the collection stays small.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::credentials::{CredentialVerifier, StoredSecretVerifier};
use crate::error::{display_message, ApiError};
use crate::links::ResourceEnvelope;
use crate::pagination::PageRequest;
use crate::service::PersonService;
use crate::types::{Person, PersonPayload};

/// Page size used while scanning for an email.
pub const EMAIL_SCAN_PAGE_SIZE: u32 = 20;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl PersonService {
    /// First person whose email equals `email`, ignoring case and
    /// surrounding whitespace. `None` once every page has been checked.
    pub async fn find_by_email(
        &self,
        email: &str,
        page_size: u32,
        cancel: &CancelToken,
    ) -> Result<Option<ResourceEnvelope<Person>>, ApiError> {
        let wanted = normalize_email(email);
        let mut page = self.list(PageRequest::new(1, page_size), cancel).await?;
        let mut visited = HashSet::new();

        loop {
            let next = page.next_link().cloned();
            if let Some(found) = page
                .items
                .into_iter()
                .find(|item| normalize_email(&item.data.email) == wanted)
            {
                return Ok(Some(found));
            }

            let Some(next) = next else {
                return Ok(None);
            };
            if !visited.insert(next.href.clone()) {
                warn!(href = %next.href, "pagination loop detected while scanning persons");
                return Ok(None);
            }
            debug!(href = %next.href, "email not on this page, following next");
            page = self.follow(&next, cancel).await?;
        }
    }

    /// Signs in with the default [`StoredSecretVerifier`].
    pub async fn authenticate(
        &self,
        email: &str,
        senha: &str,
        cancel: &CancelToken,
    ) -> Result<ResourceEnvelope<Person>, ApiError> {
        self.authenticate_with(&StoredSecretVerifier, email, senha, cancel)
            .await
    }

    /// Finds the person by email, checks the password with `verifier`, and
    /// returns the canonical resource re-read by id.
    pub async fn authenticate_with(
        &self,
        verifier: &dyn CredentialVerifier,
        email: &str,
        senha: &str,
        cancel: &CancelToken,
    ) -> Result<ResourceEnvelope<Person>, ApiError> {
        let existing = self
            .find_by_email(email, EMAIL_SCAN_PAGE_SIZE, cancel)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("email not registered with the API".to_string()))?;

        if !verifier.verify(existing.data.senha.as_deref(), senha) {
            return Err(ApiError::Unauthorized("invalid password".to_string()));
        }

        match self.get(existing.data.id, cancel).await {
            Ok(resource) => Ok(resource),
            Err(e @ (ApiError::Network { .. } | ApiError::Cancelled)) => Err(e),
            Err(e) => Err(ApiError::Http {
                status: 500,
                message: display_message(&e),
                details: None,
            }),
        }
    }

    /// Sets a new password for the person registered under `email`.
    /// `None` when nobody uses that email.
    pub async fn reset_password(
        &self,
        email: &str,
        new_senha: &str,
        cancel: &CancelToken,
    ) -> Result<Option<ResourceEnvelope<Person>>, ApiError> {
        let Some(existing) = self
            .find_by_email(email, EMAIL_SCAN_PAGE_SIZE, cancel)
            .await?
        else {
            return Ok(None);
        };

        let payload = PersonPayload {
            name: existing.data.name.clone(),
            email: existing.data.email.clone(),
            senha: Some(new_senha.to_string()),
        };
        self.update(&existing, &payload, cancel).await.map(Some)
    }
}
