//! End-to-end exercise of the HTTP surface: register users, create a
//! project, invite, accept, work a task, and read the feeds.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use huddle::api::create_router;
use huddle_core::db::Database;

fn server() -> TestServer {
    let db = Database::open_memory().expect("Failed to create test database");
    db.migrate().expect("Failed to apply schema");
    TestServer::new(create_router(db)).expect("Failed to start test server")
}

fn actor_header(id: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-actor-id"),
        HeaderValue::from_str(id).expect("invalid header value"),
    )
}

async fn register(server: &TestServer, name: &str, email: &str) -> Value {
    let res = server
        .post("/users")
        .json(&json!({ "name": name, "email": email }))
        .await;
    res.assert_status_ok();
    res.json::<Value>()
}

#[tokio::test]
async fn collaboration_flow_over_http() {
    let server = server();

    let owner = register(&server, "Olive", "olive@example.com").await;
    let invitee = register(&server, "Ana", "ana@example.com").await;
    let owner_id = owner["id"].as_str().unwrap().to_string();
    let invitee_id = invitee["id"].as_str().unwrap().to_string();
    let (h, owner_hv) = actor_header(&owner_id);
    let (_, invitee_hv) = actor_header(&invitee_id);

    // Owner creates a project.
    let res = server
        .post("/projects")
        .add_header(h.clone(), owner_hv.clone())
        .json(&json!({ "name": "Apollo", "key": "apl", "description": null }))
        .await;
    res.assert_status_ok();
    let project = res.json::<Value>();
    let project_id = project["id"].as_str().unwrap().to_string();
    assert_eq!(project["key"], "APL");

    // Owner invites Ana.
    let res = server
        .post(&format!("/projects/{project_id}/invitations"))
        .add_header(h.clone(), owner_hv.clone())
        .json(&json!({ "email": "Ana@Example.com", "role": "member" }))
        .await;
    res.assert_status_ok();
    let invitation_id = res.json::<Value>()["id"].as_str().unwrap().to_string();

    // Ana sees it in her own pending list and accepts.
    let res = server
        .get("/invitations")
        .add_header(h.clone(), invitee_hv.clone())
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>().as_array().unwrap().len(), 1);

    let res = server
        .post(&format!("/invitations/{invitation_id}/accept"))
        .add_header(h.clone(), invitee_hv.clone())
        .await;
    res.assert_status_ok();

    // Accepting twice maps the conflict onto 409.
    let res = server
        .post(&format!("/invitations/{invitation_id}/accept"))
        .add_header(h.clone(), invitee_hv.clone())
        .await;
    res.assert_status(StatusCode::CONFLICT);

    // Owner creates a task and assigns it to Ana; the legacy "completed"
    // status spelling is normalized at the boundary.
    let res = server
        .post(&format!("/projects/{project_id}/tasks"))
        .add_header(h.clone(), owner_hv.clone())
        .json(&json!({ "title": "Ship it", "description": null, "priority": "high",
                        "assigned_to": null, "due_date": null }))
        .await;
    res.assert_status_ok();
    let task_id = res.json::<Value>()["id"].as_str().unwrap().to_string();

    let res = server
        .post(&format!("/tasks/{task_id}/assign"))
        .add_header(h.clone(), owner_hv.clone())
        .json(&json!({ "assigned_to": invitee_id }))
        .await;
    res.assert_status_ok();

    let res = server
        .post(&format!("/tasks/{task_id}/status"))
        .add_header(h.clone(), owner_hv.clone())
        .json(&json!({ "status": "COMPLETED" }))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["status"], "done");

    // Ana's feed: one invite, one assignment, one status change.
    let res = server
        .get("/notifications")
        .add_header(h.clone(), invitee_hv.clone())
        .await;
    res.assert_status_ok();
    let page = res.json::<Value>();
    assert_eq!(page["total"], 3);
    assert_eq!(page["has_more"], false);

    // The grouped view puts everything under "today".
    let res = server
        .get("/notifications?grouped=true")
        .add_header(h.clone(), invitee_hv.clone())
        .await;
    res.assert_status_ok();
    let grouped = res.json::<Value>();
    assert_eq!(grouped["groups"][0]["bucket"], "today");

    // The owner's activity feed captured the whole story.
    let res = server
        .get(&format!("/projects/{project_id}/activity"))
        .add_header(h.clone(), owner_hv.clone())
        .await;
    res.assert_status_ok();
    let kinds: Vec<String> = res
        .json::<Value>()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "task_status_changed",
            "task_assigned",
            "task_created",
            "invitation_accepted",
            "member_invited",
            "project_created",
        ]
    );
}

#[tokio::test]
async fn error_mapping() {
    let server = server();
    let user = register(&server, "Olive", "olive@example.com").await;
    let user_id = user["id"].as_str().unwrap().to_string();
    let (h, hv) = actor_header(&user_id);

    // No actor header: 401.
    let res = server.get("/projects").await;
    res.assert_status(StatusCode::UNAUTHORIZED);

    // Unknown project: 404.
    let res = server
        .get("/projects/00000000-0000-0000-0000-000000000000")
        .add_header(h.clone(), hv.clone())
        .await;
    res.assert_status(StatusCode::NOT_FOUND);

    // Duplicate email: 409.
    let res = server
        .post("/users")
        .json(&json!({ "name": "Dup", "email": "olive@example.com" }))
        .await;
    res.assert_status(StatusCode::CONFLICT);

    // Malformed email: 422.
    let res = server
        .post("/users")
        .json(&json!({ "name": "Bad", "email": "not-an-email" }))
        .await;
    res.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Non-member access: 403.
    let outsider = register(&server, "Out", "out@example.com").await;
    let outsider_id = outsider["id"].as_str().unwrap().to_string();
    let (_, outsider_hv) = actor_header(&outsider_id);
    let res = server
        .post("/projects")
        .add_header(h.clone(), hv.clone())
        .json(&json!({ "name": "Apollo", "key": "APL", "description": null }))
        .await;
    let project_id = res.json::<Value>()["id"].as_str().unwrap().to_string();
    let res = server
        .get(&format!("/projects/{project_id}"))
        .add_header(h.clone(), outsider_hv)
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
}
