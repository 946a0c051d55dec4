//! Event listing filters and lifecycle.

mod common;

use common::{TestApp, TestUser};
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

async fn log(app: &TestApp, user: &TestUser, dog_id: Uuid, kind: &str, note: &str, at: &str) {
    let response = app
        .post(
            "/events",
            &user.token,
            json!({ "dog_id": dog_id, "type": kind, "note": note, "at": at }),
        )
        .await;
    assert_status!(response, 201);
}

async fn list(app: &TestApp, user: &TestUser, query: &str) -> Value {
    let response = app.get(&format!("/events?{query}"), &user.token).await;
    assert_status!(response, 200);
    response.json().await.unwrap()
}

fn types(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}

/// One owner, two dogs, four events spread over March 2025.
async fn seeded(app: &TestApp) -> TestUser {
    let owner = app.owner().await;
    let rex = app.create_dog(&owner, "Rex").await;
    let luna = app.create_dog(&owner, "Luna").await;

    log(app, &owner, rex, "walk", "Park loop", "2025-03-01T08:00:00Z").await;
    log(app, &owner, rex, "feeding", "Dry food", "2025-03-02T18:00:00Z").await;
    log(app, &owner, luna, "medication", "Deworming tablet", "2025-03-10T09:00:00Z").await;
    log(app, &owner, luna, "walk", "Beach run", "2025-03-31T07:30:00Z").await;
    owner
}

#[tokio::test]
#[serial]
async fn filters_by_type_list() {
    let app = TestApp::spawn().await;
    let owner = seeded(&app).await;

    let body = list(&app, &owner, "types=walk,%20feeding&sort_by=type&sort_order=asc").await;

    assert_eq!(body["pagination"]["total_count"], 3);
    assert_eq!(types(&body), vec!["feeding", "walk", "walk"]);
}

#[tokio::test]
#[serial]
async fn search_matches_note_or_dog_name() {
    let app = TestApp::spawn().await;
    let owner = seeded(&app).await;

    let body = list(&app, &owner, "search=BEACH").await;
    assert_eq!(body["pagination"]["total_count"], 1);

    let body = list(&app, &owner, "search=lun").await;
    assert_eq!(body["pagination"]["total_count"], 2);

    let body = list(&app, &owner, "dog_name=Rex").await;
    assert_eq!(body["pagination"]["total_count"], 2);
}

#[tokio::test]
#[serial]
async fn date_range_includes_the_last_day() {
    let app = TestApp::spawn().await;
    let owner = seeded(&app).await;

    let query = "from_date=2025-03-02&to_date=2025-03-31&sort_by=at&sort_order=asc";
    let body = list(&app, &owner, query).await;

    assert_eq!(body["pagination"]["total_count"], 3);
    assert_eq!(types(&body), vec!["feeding", "medication", "walk"]);
}

#[tokio::test]
#[serial]
async fn pages_are_clamped_and_counted() {
    let app = TestApp::spawn().await;
    let owner = seeded(&app).await;

    let body = list(&app, &owner, "per_page=3&page=2").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total_pages"], 2);

    let body = list(&app, &owner, "per_page=0&page=0").await;
    assert_eq!(body["pagination"]["per_page"], 1);
    assert_eq!(body["pagination"]["page"], 1);
}

#[tokio::test]
#[serial]
async fn owner_deletes_event() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let event_id = app.create_event(&owner, dog_id, "walk", "Short").await;

    let response = app.delete(&format!("/events/{event_id}"), &owner.token).await;
    assert_status!(response, 204);

    let response = app.get(&format!("/events/{event_id}"), &owner.token).await;
    assert_status!(response, 404);
}

#[tokio::test]
#[serial]
async fn event_for_someone_elses_dog_is_refused() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let stranger = app.owner().await;
    let dog_id = app.create_dog(&owner, "Rex").await;

    let response = app
        .post(
            "/events",
            &stranger.token,
            json!({ "dog_id": dog_id, "type": "walk", "note": "Not mine" }),
        )
        .await;

    assert_status!(response, 403);
}
