//! Typed services over one REST collection each.
//!
//! # Design
//! Every entity gets the same six operations. Mutations of an existing
//! resource go through the links the server attached to it, resolved with
//! [`LinkIntent`]; only when no suitable link exists does the service fall
//! back to the conventional `<basePath>/<id>` route. After an update the
//! canonical state is always read back from the server rather than merged
//! locally.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::links::{Link, LinkIntent, ResourceEnvelope};
use crate::pagination::{Page, PageRequest};
use crate::transport::{CallOptions, Transport};
use crate::types::{FloodAlert, FloodAlertPayload, Person, PersonPayload, RiverAddress, RiverAddressPayload};

/// An entity served from its own collection.
pub trait Resource: DeserializeOwned + Send + Sync {
    /// Collection path, e.g. `/api/person`.
    const BASE_PATH: &'static str;
    /// Create/update body: the entity minus server-assigned fields.
    type Payload: Serialize + Send + Sync;

    fn id(&self) -> i64;
}

impl Resource for Person {
    const BASE_PATH: &'static str = "/api/person";
    type Payload = PersonPayload;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for RiverAddress {
    const BASE_PATH: &'static str = "/api/riveraddress";
    type Payload = RiverAddressPayload;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for FloodAlert {
    const BASE_PATH: &'static str = "/api/floodalert";
    type Payload = FloodAlertPayload;

    fn id(&self) -> i64 {
        self.id
    }
}

pub type PersonService = ResourceService<Person>;
pub type RiverAddressService = ResourceService<RiverAddress>;
pub type FloodAlertService = ResourceService<FloodAlert>;

pub struct ResourceService<R> {
    transport: Transport,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R> fmt::Debug for ResourceService<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceService")
            .field("transport", &self.transport)
            .field("resource", &std::any::type_name::<R>())
            .finish()
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            _resource: PhantomData,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn item_path(id: i64) -> String {
        format!("{}/{id}", R::BASE_PATH)
    }

    pub async fn list(&self, page: PageRequest, cancel: &CancelToken) -> Result<Page<R>, ApiError> {
        self.transport.fetch_page(R::BASE_PATH, page, cancel).await
    }

    /// Loads the page a pagination link points at.
    pub async fn follow(&self, link: &Link, cancel: &CancelToken) -> Result<Page<R>, ApiError> {
        self.transport.follow_page(link, cancel).await
    }

    pub async fn get(&self, id: i64, cancel: &CancelToken) -> Result<ResourceEnvelope<R>, ApiError> {
        self.transport
            .fetch(&Self::item_path(id), CallOptions::get(), cancel)
            .await
    }

    pub async fn create(
        &self,
        payload: &R::Payload,
        cancel: &CancelToken,
    ) -> Result<ResourceEnvelope<R>, ApiError> {
        let options = CallOptions::new(HttpMethod::Post).with_json(payload)?;
        self.transport.fetch(R::BASE_PATH, options, cancel).await
    }

    /// Updates `resource` and returns the server's state afterwards.
    ///
    /// Submits through the resource's update link, else its self link, else
    /// `PUT <basePath>/<id>`.
    pub async fn update(
        &self,
        resource: &ResourceEnvelope<R>,
        payload: &R::Payload,
        cancel: &CancelToken,
    ) -> Result<ResourceEnvelope<R>, ApiError> {
        let id = resource.data.id();

        if let Some(link) = resource.resolve(LinkIntent::Update) {
            let target = update_target(link);
            debug!(rel = %link.rel, method = %target.method, href = %target.href, "updating through link");
            self.transport
                .submit_json::<IgnoredAny, _>(&target, payload, cancel)
                .await?;

            let read = match resource.resolve(LinkIntent::Read) {
                Some(read) => read.clone(),
                None => with_method(link, HttpMethod::Get),
            };
            return self.transport.follow_resource(&read, cancel).await;
        }

        let options = CallOptions::new(HttpMethod::Put).with_json(payload)?;
        match self
            .transport
            .call::<ResourceEnvelope<R>>(&Self::item_path(id), options, cancel)
            .await?
        {
            Some(updated) => Ok(updated),
            None => self.get(id, cancel).await,
        }
    }

    /// Deletes `resource` through its delete link, else `DELETE <basePath>/<id>`.
    pub async fn remove(&self, resource: &ResourceEnvelope<R>, cancel: &CancelToken) -> Result<(), ApiError> {
        if let Some(link) = resource.resolve(LinkIntent::Delete) {
            let target = if link.method.trim().is_empty() {
                with_method(link, HttpMethod::Delete)
            } else {
                link.clone()
            };
            self.transport.submit::<IgnoredAny>(&target, None, cancel).await?;
            return Ok(());
        }

        self.transport
            .send(
                &Self::item_path(resource.data.id()),
                CallOptions::new(HttpMethod::Delete),
                cancel,
            )
            .await
    }
}

/// The link an update is submitted through. The update intent may resolve
/// to a read-only `self` link, so a link that declares no method, or only
/// GET, is submitted with PUT.
fn update_target(link: &Link) -> Link {
    let declared = link.method.trim();
    if declared.is_empty() || declared.eq_ignore_ascii_case("GET") {
        with_method(link, HttpMethod::Put)
    } else {
        link.clone()
    }
}

fn with_method(link: &Link, method: HttpMethod) -> Link {
    Link {
        method: method.as_str().to_string(),
        ..link.clone()
    }
}
