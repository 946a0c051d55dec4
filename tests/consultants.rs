//! Consultant profiles and the directory search.

mod common;

use common::TestApp;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

fn profile(surname: &str, location: &str) -> Value {
    json!({
        "surname": surname,
        "description": "Reactive dogs and recall",
        "services": "training, behaviour",
        "breeds": "border collie",
        "location": location,
    })
}

#[tokio::test]
#[serial]
async fn consultant_saves_profile_twice() {
    let app = TestApp::spawn().await;
    let consultant = app.consultant().await;

    let response = app
        .put("/consultants/profile", &consultant.token, profile("Petrovic", "Belgrade"))
        .await;
    assert_status!(response, 200);

    let response = app
        .put("/consultants/profile", &consultant.token, profile("Petrovic", "Novi Sad"))
        .await;
    assert_status!(response, 200);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["location"], "Novi Sad");

    let response = app.get(&format!("/consultants/{}", consultant.id), &consultant.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["profile"]["location"], "Novi Sad");
    assert_eq!(body["profile"]["surname"], "Petrovic");
}

#[tokio::test]
#[serial]
async fn owner_saves_own_profile_but_stays_out_of_search() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let surname = format!("Zz{}", Uuid::new_v4().simple());

    let response = app.put("/consultants/profile", &owner.token, profile(&surname, "Nis")).await;
    assert_status!(response, 200);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["user_id"], owner.id.to_string());

    let response = app.get(&format!("/consultants?query={surname}"), &owner.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pagination"]["total_count"], 0);
}

#[tokio::test]
#[serial]
async fn search_finds_by_surname_and_location() {
    let app = TestApp::spawn().await;
    let consultant = app.consultant().await;
    let owner = app.owner().await;
    let surname = format!("Zz{}", Uuid::new_v4().simple());

    let response = app
        .put("/consultants/profile", &consultant.token, profile(&surname, "Kragujevac"))
        .await;
    assert_status!(response, 200);

    let response = app.get(&format!("/consultants?query={surname}"), &owner.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["data"][0]["id"], consultant.id.to_string());

    let response = app
        .get(&format!("/consultants?query={surname}&location=nowhere"), &owner.token)
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pagination"]["total_count"], 0);
}

#[tokio::test]
#[serial]
async fn owner_id_is_not_a_consultant() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;

    let response = app.get(&format!("/consultants/{}", owner.id), &owner.token).await;

    assert_status!(response, 404);
}
