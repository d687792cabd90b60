//! Client core for the Follow Rivers flood-monitoring API.
//!
//! # Overview
//! The API is hypermedia-driven: every resource arrives wrapped in an
//! envelope carrying `links` (self, update, delete, next, previous), and the
//! client follows those links instead of building URLs itself wherever the
//! server offers one.
//!
//! # Design
//! - `Transport` builds `HttpRequest` values and parses `HttpResponse` values
//!   as plain data; an `HttpExecutor` (reqwest in production) does the I/O.
//! - Pagination and link following sit on top of the transport.
//! - `ResourceService<R>` gives persons, river addresses and flood alerts the
//!   same list/follow/get/create/update/remove surface.
//! - `Session` caches the signed-in person in memory and in a durable slot.
//! - Every async operation takes a `CancelToken`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cancel;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod links;
pub mod pagination;
pub mod person;
pub mod service;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use cancel::CancelToken;
pub use client::FollowRivers;
pub use config::ClientConfig;
pub use credentials::{CredentialVerifier, StoredSecretVerifier};
pub use error::{display_message, validation_errors, ApiError};
pub use http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse, RequestBody, ReqwestExecutor};
pub use links::{Link, LinkIntent, ResourceEnvelope};
pub use pagination::{Page, PageNavigation, PageRequest};
pub use service::{FloodAlertService, PersonService, Resource, ResourceService, RiverAddressService};
pub use session::{PersonResource, Session, SessionPhase, SessionState};
pub use storage::{FileSlot, KeyValueSlot, MemorySlot, StorageError};
pub use transport::{CallOptions, Transport};
pub use types::{
    FloodAlert, FloodAlertPayload, Person, PersonPayload, ProblemDetails, RiverAddress, RiverAddressPayload,
    Severity,
};
