//! Project integration tests: creation, reads, recent list, code lookup and updates.

mod common;

use common::{json_body, TestApp};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn create_project_makes_the_caller_admin() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;

    let response = app
        .post(
            "/projects",
            &owner.access_token,
            json!({ "title": "Website relaunch", "category": "Marketing" }),
        )
        .await;

    assert_status!(response, 201);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["project"]["title"], "Website relaunch");
    assert_eq!(body["data"]["project"]["status"], "Active");
    assert_eq!(body["data"]["project"]["code"].as_str().unwrap().len(), 8);
    assert_eq!(body["data"]["membership"]["role"], "Admin");
    assert_eq!(body["data"]["membership"]["status"], "Active");
}

#[tokio::test]
#[serial]
async fn create_project_rejects_blank_title_and_inverted_dates() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;

    let blank = app
        .post("/projects", &owner.access_token, json!({ "title": "   " }))
        .await;
    assert_status!(blank, 400);

    let inverted = app
        .post(
            "/projects",
            &owner.access_token,
            json!({
                "title": "Backwards",
                "start_date": "2025-03-10",
                "end_date": "2025-03-01"
            }),
        )
        .await;
    assert_status!(inverted, 400);
}

#[tokio::test]
#[serial]
async fn list_projects_only_shows_active_memberships() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;
    let other = app.register("Bea").await;
    app.create_project(&owner, "Mine").await;
    app.create_project(&other, "Theirs").await;

    let body = json_body(app.get("/projects", &owner.access_token).await).await;
    let projects = body["data"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["title"], "Mine");
    assert_eq!(projects[0]["role"], "Admin");
}

#[tokio::test]
#[serial]
async fn outsiders_cannot_read_a_project() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;
    let outsider = app.register("Olly").await;
    let project = app.create_project(&owner, "Private").await;
    let project_id = project["id"].as_i64().unwrap();

    let response = app
        .get(&format!("/projects/{}", project_id), &outsider.access_token)
        .await;
    assert_status!(response, 403);

    let missing = app.get("/projects/99999", &owner.access_token).await;
    assert_status!(missing, 404);
}

#[tokio::test]
#[serial]
async fn code_lookup_requires_membership() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;
    let outsider = app.register("Olly").await;
    let project = app.create_project(&owner, "Coded").await;
    let code = project["code"].as_str().unwrap();

    let ok = app
        .get(&format!("/projects/code/{}", code), &owner.access_token)
        .await;
    assert_status!(ok, 200);
    assert_eq!(json_body(ok).await["data"]["id"], project["id"]);

    let forbidden = app
        .get(&format!("/projects/code/{}", code), &outsider.access_token)
        .await;
    assert_status!(forbidden, 403);

    let unknown = app
        .get("/projects/code/NOPE0000", &owner.access_token)
        .await;
    assert_status!(unknown, 404);
}

#[tokio::test]
#[serial]
async fn opening_projects_orders_the_recent_list() {
    let app = TestApp::spawn().await;
    let owner = app.register("Ada").await;
    let first = app.create_project(&owner, "First").await;
    let second = app.create_project(&owner, "Second").await;

    for project in [&second, &first] {
        let response = app
            .post(
                &format!("/projects/{}/open", project["id"]),
                &owner.access_token,
                json!({}),
            )
            .await;
        assert_status!(response, 200);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let body = json_body(app.get("/projects/recent", &owner.access_token).await).await;
    let recent = body["data"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["title"], "First");
    assert_eq!(recent[1]["title"], "Second");
}

#[tokio::test]
#[serial]
async fn update_project_notifies_other_members_once() {
    let app = TestApp::spawn().await;
    let admin = app.register("Ada").await;
    let editor = app.register("Eli").await;
    let project = app.create_project(&admin, "Launch").await;
    let project_id = project["id"].as_i64().unwrap();
    app.add_member(&admin, project_id, &editor, "Editor").await;

    let response = app
        .put(
            &format!("/projects/{}", project_id),
            &admin.access_token,
            json!({
                "title": "Launch v2",
                "description": "Second attempt",
                "category": "Testing",
                "status": "On Hold",
                "start_date": null,
                "end_date": null
            }),
        )
        .await;

    assert_status!(response, 200);
    let body = json_body(response).await;
    assert_eq!(body["data"]["title"], "Launch v2");
    assert_eq!(body["data"]["status"], "On Hold");

    let editor_kinds = app.notification_types(editor.id);
    assert_eq!(
        editor_kinds.iter().filter(|k| *k == "ProjectUpdated").count(),
        1
    );
    assert!(!app
        .notification_types(admin.id)
        .contains(&"ProjectUpdated".to_string()));
}

#[tokio::test]
#[serial]
async fn only_admins_update_projects() {
    let app = TestApp::spawn().await;
    let admin = app.register("Ada").await;
    let editor = app.register("Eli").await;
    let project = app.create_project(&admin, "Launch").await;
    let project_id = project["id"].as_i64().unwrap();
    app.add_member(&admin, project_id, &editor, "Editor").await;

    let response = app
        .put(
            &format!("/projects/{}", project_id),
            &editor.access_token,
            json!({
                "title": "Hijacked",
                "description": "",
                "category": "Testing",
                "status": "Active",
                "start_date": null,
                "end_date": null
            }),
        )
        .await;

    assert_status!(response, 403);
    assert_eq!(json_body(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
#[serial]
async fn project_history_pages_newest_first() {
    let app = TestApp::spawn().await;
    let admin = app.register("Ada").await;
    let project = app.create_project(&admin, "Launch").await;
    let project_id = project["id"].as_i64().unwrap();

    let body = json_body(
        app.get(
            &format!("/projects/{}/history?per_page=1", project_id),
            &admin.access_token,
        )
        .await,
    )
    .await;

    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["pagination"]["per_page"], 1);
    assert!(body["data"][0]["action_description"]
        .as_str()
        .unwrap()
        .ends_with("created the project"));
}
