//! Permission grants over HTTP and the idempotency of the underlying stores.

mod common;

use std::sync::Arc;

use common::TestApp;
use pawtrack::access::{grants, permissions, PgPermissionStore};
use pawtrack::cache::PermissionCache;
use serde_json::{json, Value};
use serial_test::serial;

fn names(body: &Value) -> Vec<String> {
    body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p.as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
#[serial]
async fn granting_twice_keeps_one_row() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let consultant = app.consultant().await;
    let path = format!("/users/{}/permissions", consultant.id);

    for _ in 0..2 {
        let response = app
            .post(&path, &admin.token, json!({ "permission": "EVENTS_VIEW_OWN" }))
            .await;
        assert_status!(response, 200);
    }

    assert_eq!(app.permission_rows(consultant.id, "EVENTS_VIEW_OWN"), 1);

    let response = app.get(&path, &admin.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert!(names(&body).contains(&"EVENTS_VIEW_OWN".to_string()));
}

#[tokio::test]
#[serial]
async fn unknown_permission_is_not_found() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let owner = app.owner().await;

    let response = app
        .post(
            &format!("/users/{}/permissions", owner.id),
            &admin.token,
            json!({ "permission": "DOGS_FLY" }),
        )
        .await;

    assert_status!(response, 404);
}

#[tokio::test]
#[serial]
async fn non_admin_cannot_read_or_grant_for_others() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let other = app.owner().await;
    let path = format!("/users/{}/permissions", other.id);

    let response = app.get(&path, &owner.token).await;
    assert_status!(response, 403);

    let response = app
        .post(&path, &owner.token, json!({ "permission": "EVENTS_VIEW_ALL" }))
        .await;
    assert_status!(response, 403);
    assert_eq!(app.permission_rows(other.id, "EVENTS_VIEW_ALL"), 0);
}

#[tokio::test]
#[serial]
async fn revoke_is_idempotent() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let owner = app.owner().await;
    let path = format!("/users/{}/permissions/DOGS_CREATE", owner.id);
    assert_eq!(app.permission_rows(owner.id, "DOGS_CREATE"), 1);

    let response = app.delete(&path, &admin.token).await;
    assert_status!(response, 204);
    let response = app.delete(&path, &admin.token).await;
    assert_status!(response, 204);
    assert_eq!(app.permission_rows(owner.id, "DOGS_CREATE"), 0);

    // Revocation takes effect on the next request.
    let response = app.get("/users/me/permissions", &owner.token).await;
    let body: Value = response.json().await.unwrap();
    assert!(!names(&body).contains(&"DOGS_CREATE".to_string()));
}

#[tokio::test]
#[serial]
async fn repeated_access_grants_accumulate_rows() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;

    let mut conn = app.db_pool.get().unwrap();
    assert!(!grants::has_access_in(&mut conn, consultant.id, dog_id).unwrap());

    grants::grant_access_in(&mut conn, consultant.id, dog_id).unwrap();
    grants::grant_access_in(&mut conn, consultant.id, dog_id).unwrap();

    assert!(grants::has_access_in(&mut conn, consultant.id, dog_id).unwrap());
    let rows = grants::list_grants_in(&mut conn, consultant.id, dog_id).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|g| g.is_active()));
    drop(conn);
    assert_eq!(app.access_rows(consultant.id, dog_id), 2);
}

#[tokio::test]
#[serial]
async fn store_level_grant_is_a_no_op_when_held() {
    let app = TestApp::spawn().await;
    let consultant = app.consultant().await;

    let mut conn = app.db_pool.get().unwrap();
    assert!(!permissions::has_permission_in(&mut conn, consultant.id, "EVENTS_VIEW_ALL").unwrap());

    permissions::grant_in(&mut conn, consultant.id, "EVENTS_VIEW_ALL").unwrap();
    permissions::grant_in(&mut conn, consultant.id, "EVENTS_VIEW_ALL").unwrap();

    assert!(permissions::has_permission_in(&mut conn, consultant.id, "EVENTS_VIEW_ALL").unwrap());
    assert!(permissions::grant_in(&mut conn, consultant.id, "NOT_A_PERMISSION").is_err());
    drop(conn);
    assert_eq!(app.permission_rows(consultant.id, "EVENTS_VIEW_ALL"), 1);
}

#[tokio::test]
#[serial]
async fn batch_grant_reports_failures_and_keeps_the_rest() {
    let app = TestApp::spawn().await;
    let consultant = app.consultant().await;
    let store = PgPermissionStore::new(app.db_pool.clone(), Arc::new(PermissionCache::new(None)));

    let report = store
        .grant_many(consultant.id, &["DOGS_VIEW_ALL", "DOGS_FLY", "EVENTS_VIEW_ALL"])
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed_names(), vec!["DOGS_FLY"]);
    assert_eq!(report.granted, vec!["DOGS_VIEW_ALL", "EVENTS_VIEW_ALL"]);

    let held = store.list_permissions(consultant.id).await.unwrap();
    assert!(held.contains("DOGS_VIEW_ALL"));
    assert!(held.contains("EVENTS_VIEW_ALL"));
}

#[tokio::test]
#[serial]
async fn store_backfill_restores_role_defaults() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let store = PgPermissionStore::new(app.db_pool.clone(), Arc::new(PermissionCache::new(None)));

    store.revoke(owner.id, "DOGS_CREATE").await.unwrap();
    assert!(!store.list_permissions(owner.id).await.unwrap().contains("DOGS_CREATE"));

    let summary = store.backfill_role_defaults().await.unwrap();

    assert!(summary.user_ids.contains(&owner.id));
    assert!(store.list_permissions(owner.id).await.unwrap().contains("DOGS_CREATE"));
    assert_eq!(app.permission_rows(owner.id, "DOGS_CREATE"), 1);
}
