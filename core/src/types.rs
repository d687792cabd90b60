//! Domain DTOs for the Follow Rivers API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch any drift between the two crates. Wire names are
//! camelCase. Create and update payloads share one shape per entity: the
//! entity minus server-assigned fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RFC7807-style error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Validation messages keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
}

/// Payload for creating or updating a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPayload {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
}

/// A river location a person monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverAddress {
    pub id: i64,
    pub address: String,
    pub can_cause_flood: bool,
    pub person_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverAddressPayload {
    pub address: String,
    pub can_cause_flood: bool,
    pub person_id: i64,
}

/// A flood alert raised for a river address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodAlert {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Raw severity label; see [`Severity`] for the known values.
    pub severity: String,
    pub person_id: i64,
    pub river_address_id: i64,
    pub created_at: String,
}

impl FloodAlert {
    pub fn severity(&self) -> Option<Severity> {
        self.severity.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodAlertPayload {
    pub title: String,
    pub description: String,
    pub severity: String,
    pub person_id: i64,
    pub river_address_id: i64,
}

/// Severity labels the API uses for flood alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Severity {
    Low,
    #[default]
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Moderate,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Baixo",
            Severity::Moderate => "Moderado",
            Severity::High => "Alto",
            Severity::Critical => "Crítico",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Severity::ALL
            .into_iter()
            .find(|sev| {
                sev.as_str().eq_ignore_ascii_case(s)
                    || (*sev == Severity::Critical && s.eq_ignore_ascii_case("Critico"))
            })
            .ok_or_else(|| s.to_string())
    }
}
