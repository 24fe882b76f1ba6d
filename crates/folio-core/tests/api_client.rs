//! ApiClient against a mock catalog API.

use std::sync::Arc;

use folio_core::api::{ApiClient, ApiError};
use folio_core::auth::{ActivityTarget, MemoryStore, SessionConfig, SessionManager};
use folio_core::clock::SystemClock;
use folio_core::models::{NewProject, ProjectStatus, ProjectType, ProjectUpdate};
use serde_json::json;
use wiremock::matchers::{any, body_json, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> SessionManager {
    SessionManager::new(
        Arc::new(MemoryStore::new()),
        ActivityTarget::new(),
        Arc::new(SystemClock),
        SessionConfig::default(),
    )
}

fn signed_in_client(server: &MockServer) -> ApiClient {
    let session = session();
    session.login("abc123");
    ApiClient::new(server.uri(), session).unwrap()
}

fn api_error(err: &anyhow::Error) -> &ApiError {
    err.downcast_ref::<ApiError>().expect("ApiError")
}

#[tokio::test]
async fn test_logged_out_requests_never_hit_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = ApiClient::new(server.uri(), session()).unwrap();

    let err = client.list_projects().await.unwrap_err();
    assert!(matches!(api_error(&err), ApiError::NotAuthenticated));
}

#[tokio::test]
async fn test_list_projects_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"_id": "p1", "name": "Harbor View", "status": "Planning"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let projects = client.list_projects().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Harbor View");
}

#[tokio::test]
async fn test_unauthorized_response_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contact"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "jwt expired"})))
        .mount(&server)
        .await;
    let client = signed_in_client(&server);
    let session = client.session().clone();

    let err = client.list_contacts().await.unwrap_err();
    assert!(api_error(&err).requires_sign_in());
    assert!(!session.is_authenticated());
    assert_eq!(session.token(), None);
}

#[tokio::test]
async fn test_sign_in_starts_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"email": "staff@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "issued-token"})))
        .expect(1)
        .mount(&server)
        .await;
    let session = session();
    let client = ApiClient::new(server.uri(), session.clone()).unwrap();

    client.sign_in("staff@example.com", "hunter2").await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.token().as_deref(), Some("issued-token"));
}

#[tokio::test]
async fn test_sign_in_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&server)
        .await;
    let session = session();
    let client = ApiClient::new(server.uri(), session.clone()).unwrap();

    let err = client.sign_in("staff@example.com", "wrong").await.unwrap_err();
    assert!(matches!(api_error(&err), ApiError::AccessDenied(_)));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_update_project_sends_partial_json() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/projects/p1"))
        .and(header("authorization", "Bearer abc123"))
        .and(body_json(json!({"status": "On Hold", "totalUnits": 40})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"_id": "p1", "name": "Harbor View", "status": "On Hold", "totalUnits": 40}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let update = ProjectUpdate {
        status: Some(ProjectStatus::OnHold),
        total_units: Some(40),
        ..ProjectUpdate::default()
    };
    let project = client.update_project("p1", &update).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::OnHold);
    assert_eq!(project.total_units, Some(40));
}

#[tokio::test]
async fn test_empty_update_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let err = client
        .update_project("p1", &ProjectUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(api_error(&err), ApiError::Validation(_)));
}

#[tokio::test]
async fn test_create_project_posts_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projects/create"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Project created",
            "data": {"_id": "p9", "name": "Harbor View"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let project = NewProject {
        name: "Harbor View".to_string(),
        description: "Waterfront condos".to_string(),
        address: "1 Pier Rd".to_string(),
        city: "Portland".to_string(),
        state: "ME".to_string(),
        project_type: Some(ProjectType::Residential),
        ..NewProject::default()
    };
    let result = client.create_project(&project).await.unwrap();
    assert_eq!(result.message.as_deref(), Some("Project created"));
    assert_eq!(result.project.map(|p| p.id).as_deref(), Some("p9"));
}

#[tokio::test]
async fn test_delete_contacts_reports_each_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/contact/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/contact/c2"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Contact not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let ids = vec!["c1".to_string(), "c2".to_string()];
    let results = client.delete_contacts(&ids).await;

    assert_eq!(results.len(), 2);
    for (id, result) in &results {
        match id.as_str() {
            "c1" => assert!(result.is_ok()),
            "c2" => assert!(matches!(
                result.as_ref().map_err(api_error),
                Err(ApiError::NotFound(_))
            )),
            other => panic!("unexpected id {}", other),
        }
    }
}

#[tokio::test]
async fn test_invalid_upload_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = signed_in_client(&server);

    let err = client
        .create_project(&NewProject::default())
        .await
        .unwrap_err();
    assert!(matches!(api_error(&err), ApiError::Validation(_)));
}
