use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with_db, Db, Envelope, FloodAlert, PageBody, Person, ProblemBody, RiverAddress};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::HOST, "rivers.test")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(http::header::HOST, "rivers.test")
        .body(String::new())
        .unwrap()
}

async fn create_person(app: &Router, name: &str, email: &str) -> Envelope<Person> {
    let body = format!(r#"{{"name":"{name}","email":"{email}","senha":"S3nha!"}}"#);
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/person", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

// --- person ---

#[tokio::test]
async fn list_persons_empty() {
    let resp = app().oneshot(get_request("/api/person")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page: PageBody<Person> = body_json(resp).await;
    assert!(page.items.is_empty());
    assert_eq!(page.page_number, 1);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.total_pages, 1);
    assert!(page.links.iter().all(|l| l.rel != "next" && l.rel != "previous"));
}

#[tokio::test]
async fn create_person_returns_envelope_with_links() {
    let app = app_with_db(Db::default());
    let created = create_person(&app, "Mariana", "mariana@x.com").await;

    assert_eq!(created.data.name, "Mariana");
    assert_eq!(created.data.senha.as_deref(), Some("S3nha!"));
    let href = format!("http://rivers.test/api/person/{}", created.data.id);
    let rels: Vec<_> = created.links.iter().map(|l| (l.rel.as_str(), l.method.as_str())).collect();
    assert_eq!(
        rels,
        vec![("self", "GET"), ("update-person", "PUT"), ("delete-person", "DELETE")]
    );
    assert!(created.links.iter().all(|l| l.href == href));
}

#[tokio::test]
async fn create_person_blank_fields_returns_problem_details() {
    let resp = app()
        .oneshot(json_request("POST", "/api/person", r#"{"name":"","email":""}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let problem: ProblemBody = body_json(resp).await;
    assert_eq!(problem.title, "One or more validation errors occurred.");
    assert_eq!(problem.status, 400);
    let errors = problem.errors.unwrap();
    assert!(errors.contains_key("name"));
    assert!(errors.contains_key("email"));
}

#[tokio::test]
async fn create_person_duplicate_email_conflicts() {
    let app = app_with_db(Db::default());
    create_person(&app, "Ana", "ana@x.com").await;
    let resp = app
        .oneshot(json_request("POST", "/api/person", r#"{"name":"Ana 2","email":"ANA@x.com"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let problem: ProblemBody = body_json(resp).await;
    assert!(problem.detail.unwrap().contains("ana@x.com"));
}

#[tokio::test]
async fn create_person_malformed_json_is_rejected() {
    let resp = app()
        .oneshot(json_request("POST", "/api/person", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_person_not_found_is_problem() {
    let resp = app().oneshot(get_request("/api/person/42")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let problem: ProblemBody = body_json(resp).await;
    assert_eq!(problem.title, "Not Found");
}

#[tokio::test]
async fn get_person_bad_id_returns_400() {
    let resp = app().oneshot(get_request("/api/person/not-a-number")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_person_replaces_fields() {
    let app = app_with_db(Db::default());
    let created = create_person(&app, "Mariana", "mariana@x.com").await;
    let uri = format!("/api/person/{}", created.data.id);

    let resp = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            r#"{"name":"Mariana Souza","email":"mariana@x.com","senha":"Nova!"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get_request(&uri)).await.unwrap();
    let fetched: Envelope<Person> = body_json(resp).await;
    assert_eq!(fetched.data.name, "Mariana Souza");
    assert_eq!(fetched.data.senha.as_deref(), Some("Nova!"));
}

#[tokio::test]
async fn update_person_not_found() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/person/9", r#"{"name":"X","email":"x@x.com"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_person_returns_204_then_404() {
    let app = app_with_db(Db::default());
    let created = create_person(&app, "Ana", "ana@x.com").await;
    let uri = format!("/api/person/{}", created.data.id);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(String::new())
            .unwrap()
    };

    let resp = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = app.oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- pagination ---

#[tokio::test]
async fn pages_link_to_neighbours() {
    let app = app_with_db(Db::default());
    for i in 0..5 {
        create_person(&app, &format!("P{i}"), &format!("p{i}@x.com")).await;
    }

    let resp = app
        .clone()
        .oneshot(get_request("/api/person?pageNumber=1&pageSize=2"))
        .await
        .unwrap();
    let first: PageBody<Person> = body_json(resp).await;
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_items, 5);
    assert_eq!(first.total_pages, 3);
    let next = first.links.iter().find(|l| l.rel == "next").unwrap();
    assert_eq!(next.href, "http://rivers.test/api/person?pageNumber=2&pageSize=2");
    assert!(first.links.iter().all(|l| l.rel != "previous"));

    let resp = app
        .oneshot(get_request("/api/person?pageNumber=3&pageSize=2"))
        .await
        .unwrap();
    let last: PageBody<Person> = body_json(resp).await;
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].data.name, "P4");
    assert!(last.links.iter().any(|l| l.rel == "previous"));
    assert!(last.links.iter().all(|l| l.rel != "next"));
}

// --- river addresses and alerts ---

#[tokio::test]
async fn river_address_requires_existing_person() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/riveraddress",
            r#"{"address":"Rua do Rio, 1","canCauseFlood":true,"personId":99}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: ProblemBody = body_json(resp).await;
    assert!(problem.errors.unwrap().contains_key("personId"));
}

#[tokio::test]
async fn flood_alert_lifecycle() {
    let app = app_with_db(Db::default());
    let person = create_person(&app, "Ana", "ana@x.com").await;

    let body = format!(
        r#"{{"address":"Rua do Rio, 1","canCauseFlood":true,"personId":{}}}"#,
        person.data.id
    );
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/riveraddress", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let address: Envelope<RiverAddress> = body_json(resp).await;
    assert!(address.data.can_cause_flood);
    assert!(address.links.iter().any(|l| l.rel == "update-riveraddress"));

    let body = format!(
        r#"{{"title":"Cheia","description":"Rio subindo","severity":"Alto","personId":{},"riverAddressId":{}}}"#,
        person.data.id, address.data.id
    );
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/floodalert", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let alert: Envelope<FloodAlert> = body_json(resp).await;
    assert_eq!(alert.data.severity, "Alto");
    assert!(!alert.data.created_at.is_empty());

    let resp = app.oneshot(get_request("/api/floodalert")).await.unwrap();
    let page: PageBody<FloodAlert> = body_json(resp).await;
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].data.river_address_id, address.data.id);
}
