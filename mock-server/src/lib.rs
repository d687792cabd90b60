use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

const DEFAULT_BASE: &str = "http://localhost:5000";
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    pub method: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBody<T> {
    pub items: Vec<Envelope<T>>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProblemBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
}

#[derive(Deserialize)]
pub struct PersonInput {
    pub name: String,
    pub email: String,
    pub senha: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverAddress {
    pub id: i64,
    pub address: String,
    pub can_cause_flood: bool,
    pub person_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverAddressInput {
    pub address: String,
    #[serde(default)]
    pub can_cause_flood: bool,
    pub person_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodAlert {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub person_id: i64,
    pub river_address_id: i64,
    pub created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodAlertInput {
    pub title: String,
    pub description: String,
    pub severity: String,
    pub person_id: i64,
    pub river_address_id: i64,
}

#[derive(Debug, Default)]
pub struct Store {
    next_id: i64,
    persons: BTreeMap<i64, Person>,
    addresses: BTreeMap<i64, RiverAddress>,
    alerts: BTreeMap<i64, FloodAlert>,
}

impl Store {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

/// A non-2xx answer carrying an RFC7807 body.
#[derive(Debug)]
pub struct Problem {
    status: StatusCode,
    body: ProblemBody,
}

impl Problem {
    fn new(status: StatusCode, title: &str) -> Self {
        Self {
            status,
            body: ProblemBody {
                kind: format!("https://httpstatuses.io/{}", status.as_u16()),
                title: title.to_string(),
                status: status.as_u16(),
                ..Default::default()
            },
        }
    }

    fn not_found(path: &str, id: i64) -> Self {
        let mut p = Self::new(StatusCode::NOT_FOUND, "Not Found");
        p.body.detail = Some(format!("{path} {id} does not exist"));
        p
    }

    fn conflict(detail: String) -> Self {
        let mut p = Self::new(StatusCode::CONFLICT, "Conflict");
        p.body.detail = Some(detail);
        p
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self.body),
        )
            .into_response()
    }
}

/// Collects field errors, turning into a 400 problem when any were recorded.
#[derive(Default)]
struct Validation(BTreeMap<String, Vec<String>>);

impl Validation {
    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, &format!("The {field} field is required."));
        }
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_default().push(message.to_string());
    }

    fn finish(self) -> Result<(), Problem> {
        if self.0.is_empty() {
            return Ok(());
        }
        let mut p = Problem::new(StatusCode::BAD_REQUEST, "One or more validation errors occurred.");
        p.body.errors = Some(self.0);
        Err(p)
    }
}

/// One REST collection served by the stub.
trait Entity: Clone + Serialize + Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;
    /// Path segment under `/api`, also used in link rels.
    const PATH: &'static str;

    fn table(store: &Store) -> &BTreeMap<i64, Self>;
    fn table_mut(store: &mut Store) -> &mut BTreeMap<i64, Self>;
    fn validate(input: &Self::Input, store: &Store, id: Option<i64>) -> Result<(), Problem>;
    fn build(id: i64, input: Self::Input, existing: Option<&Self>) -> Self;
}

impl Entity for Person {
    type Input = PersonInput;
    const PATH: &'static str = "person";

    fn table(store: &Store) -> &BTreeMap<i64, Self> {
        &store.persons
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<i64, Self> {
        &mut store.persons
    }

    fn validate(input: &PersonInput, store: &Store, id: Option<i64>) -> Result<(), Problem> {
        let mut v = Validation::default();
        v.require("name", &input.name);
        v.require("email", &input.email);
        if !input.email.trim().is_empty() && !input.email.contains('@') {
            v.fail("email", "The email field is not a valid e-mail address.");
        }
        v.finish()?;

        let email = input.email.trim().to_lowercase();
        let taken = store
            .persons
            .values()
            .any(|p| Some(p.id) != id && p.email.trim().to_lowercase() == email);
        if taken {
            return Err(Problem::conflict(format!("email {email} is already registered")));
        }
        Ok(())
    }

    fn build(id: i64, input: PersonInput, _existing: Option<&Self>) -> Self {
        Person {
            id,
            name: input.name,
            email: input.email,
            senha: input.senha,
        }
    }
}

impl Entity for RiverAddress {
    type Input = RiverAddressInput;
    const PATH: &'static str = "riveraddress";

    fn table(store: &Store) -> &BTreeMap<i64, Self> {
        &store.addresses
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<i64, Self> {
        &mut store.addresses
    }

    fn validate(input: &RiverAddressInput, store: &Store, _id: Option<i64>) -> Result<(), Problem> {
        let mut v = Validation::default();
        v.require("address", &input.address);
        if !store.persons.contains_key(&input.person_id) {
            v.fail("personId", "The referenced person does not exist.");
        }
        v.finish()
    }

    fn build(id: i64, input: RiverAddressInput, _existing: Option<&Self>) -> Self {
        RiverAddress {
            id,
            address: input.address,
            can_cause_flood: input.can_cause_flood,
            person_id: input.person_id,
        }
    }
}

impl Entity for FloodAlert {
    type Input = FloodAlertInput;
    const PATH: &'static str = "floodalert";

    fn table(store: &Store) -> &BTreeMap<i64, Self> {
        &store.alerts
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<i64, Self> {
        &mut store.alerts
    }

    fn validate(input: &FloodAlertInput, store: &Store, _id: Option<i64>) -> Result<(), Problem> {
        let mut v = Validation::default();
        v.require("title", &input.title);
        v.require("description", &input.description);
        v.require("severity", &input.severity);
        if !store.persons.contains_key(&input.person_id) {
            v.fail("personId", "The referenced person does not exist.");
        }
        if !store.addresses.contains_key(&input.river_address_id) {
            v.fail("riverAddressId", "The referenced river address does not exist.");
        }
        v.finish()
    }

    fn build(id: i64, input: FloodAlertInput, existing: Option<&Self>) -> Self {
        let created_at = existing
            .map(|a| a.created_at.clone())
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        FloodAlert {
            id,
            title: input.title,
            description: input.description,
            severity: input.severity,
            person_id: input.person_id,
            river_address_id: input.river_address_id,
            created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

pub fn app() -> Router {
    app_with_db(Db::default())
}

/// Router over an existing store, so tests can inspect or seed it.
pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/api/person", get(list::<Person>).post(create::<Person>))
        .route(
            "/api/person/{id}",
            get(fetch::<Person>).put(update::<Person>).delete(remove::<Person>),
        )
        .route("/api/riveraddress", get(list::<RiverAddress>).post(create::<RiverAddress>))
        .route(
            "/api/riveraddress/{id}",
            get(fetch::<RiverAddress>)
                .put(update::<RiverAddress>)
                .delete(remove::<RiverAddress>),
        )
        .route("/api/floodalert", get(list::<FloodAlert>).post(create::<FloodAlert>))
        .route(
            "/api/floodalert/{id}",
            get(fetch::<FloodAlert>)
                .put(update::<FloodAlert>)
                .delete(remove::<FloodAlert>),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Absolute base for links, taken from the request's Host header.
fn base_url(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| DEFAULT_BASE.to_string())
}

fn envelope<E: Entity>(base: &str, item: E, id: i64) -> Envelope<E> {
    let href = format!("{base}/api/{}/{id}", E::PATH);
    Envelope {
        data: item,
        links: vec![
            link(&href, "self", "GET"),
            link(&href, &format!("update-{}", E::PATH), "PUT"),
            link(&href, &format!("delete-{}", E::PATH), "DELETE"),
        ],
    }
}

fn link(href: &str, rel: &str, method: &str) -> Link {
    Link {
        href: href.to_string(),
        rel: rel.to_string(),
        method: method.to_string(),
    }
}

async fn list<E: Entity>(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Json<PageBody<E>> {
    let base = base_url(&headers);
    let page_number = params.page_number.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);

    let store = db.read().await;
    let table = E::table(&store);
    let total_items = table.len() as u64;
    let total_pages = (total_items.div_ceil(u64::from(page_size)) as u32).max(1);

    let skip = (page_number - 1).saturating_mul(page_size) as usize;
    let items = table
        .iter()
        .skip(skip)
        .take(page_size as usize)
        .map(|(id, item)| envelope(&base, item.clone(), *id))
        .collect();

    let page_href = |n: u32| format!("{base}/api/{}?pageNumber={n}&pageSize={page_size}", E::PATH);
    let mut links = vec![link(&page_href(page_number), "self", "GET")];
    if page_number > 1 {
        links.push(link(&page_href(page_number - 1), "previous", "GET"));
    }
    if page_number < total_pages {
        links.push(link(&page_href(page_number + 1), "next", "GET"));
    }

    Json(PageBody {
        items,
        page_number,
        page_size,
        total_items,
        total_pages,
        links,
    })
}

async fn create<E: Entity>(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<E::Input>,
) -> Result<(StatusCode, Json<Envelope<E>>), Problem> {
    let mut store = db.write().await;
    E::validate(&input, &store, None)?;
    let id = store.allocate_id();
    let item = E::build(id, input, None);
    E::table_mut(&mut store).insert(id, item.clone());
    info!(collection = E::PATH, id, "created");
    Ok((StatusCode::CREATED, Json(envelope(&base_url(&headers), item, id))))
}

async fn fetch<E: Entity>(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<E>>, Problem> {
    let store = db.read().await;
    let item = E::table(&store)
        .get(&id)
        .cloned()
        .ok_or_else(|| Problem::not_found(E::PATH, id))?;
    Ok(Json(envelope(&base_url(&headers), item, id)))
}

async fn update<E: Entity>(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<E::Input>,
) -> Result<Json<Envelope<E>>, Problem> {
    let mut store = db.write().await;
    let existing = E::table(&store)
        .get(&id)
        .cloned()
        .ok_or_else(|| Problem::not_found(E::PATH, id))?;
    E::validate(&input, &store, Some(id))?;
    let item = E::build(id, input, Some(&existing));
    E::table_mut(&mut store).insert(id, item.clone());
    info!(collection = E::PATH, id, "updated");
    Ok(Json(envelope(&base_url(&headers), item, id)))
}

async fn remove<E: Entity>(State(db): State<Db>, Path(id): Path<i64>) -> Result<StatusCode, Problem> {
    let mut store = db.write().await;
    match E::table_mut(&mut store).remove(&id) {
        Some(_) => {
            info!(collection = E::PATH, id, "deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(Problem::not_found(E::PATH, id)),
    }
}
