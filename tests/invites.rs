//! Invite lifecycle over HTTP: creation, single-use acceptance, expiry and
//! the notification outbox.

mod common;

use common::TestApp;
use diesel::prelude::*;
use pawtrack::events::{EventType, OutboxService};
use pawtrack::models::OutboxEvent;
use pawtrack::schema::outbox_events;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn accepting_twice_fails_the_second_time() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let invite = app.invite(&owner, &consultant, dog_id).await;

    let response = app.accept(&consultant, &invite.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invite"]["status"], "accepted");
    assert_eq!(body["access"]["dog_id"], dog_id.to_string());
    assert!(body["failed"].as_array().unwrap().is_empty());
    assert!(body["granted"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "DOGS_VIEW_ASSIGNED"));

    let response = app.accept(&consultant, &invite.token).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVITE_NOT_PENDING");

    assert_eq!(app.access_rows(consultant.id, dog_id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn racing_acceptances_have_one_winner() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let invite = app.invite(&owner, &consultant, dog_id).await;

    let (first, second) = tokio::join!(
        app.accept(&consultant, &invite.token),
        app.accept(&consultant, &invite.token)
    );

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 400]);

    assert_eq!(app.access_rows(consultant.id, dog_id), 1);
    assert_eq!(app.outbox_count("invite.accepted", invite.id), 1);
}

#[tokio::test]
#[serial]
async fn expired_invite_is_rejected_and_stays_rejected() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let invite = app.invite(&owner, &consultant, dog_id).await;
    app.backdate_invite(invite.id);

    let response = app.accept(&consultant, &invite.token).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVITE_EXPIRED");
    assert_eq!(app.invite_status(invite.id), "rejected");

    let response = app.accept(&consultant, &invite.token).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVITE_NOT_PENDING");

    assert_eq!(app.access_rows(consultant.id, dog_id), 0);
    assert_eq!(app.outbox_count("invite.expired", invite.id), 1);
}

#[tokio::test]
#[serial]
async fn invite_for_someone_else_is_refused_without_side_effects() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let invited = app.consultant().await;
    let interloper = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let invite = app.invite(&owner, &invited, dog_id).await;

    let response = app.accept(&interloper, &invite.token).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVITE_WRONG_CONSULTANT");
    assert_eq!(app.invite_status(invite.id), "pending");

    let response = app.accept(&invited, &invite.token).await;
    assert_status!(response, 200);
}

#[tokio::test]
#[serial]
async fn unknown_token_is_not_found() {
    let app = TestApp::spawn().await;
    let consultant = app.consultant().await;

    let response = app.accept(&consultant, "deadbeef").await;

    assert_status!(response, 404);
}

#[tokio::test]
#[serial]
async fn only_the_owner_can_invite_for_a_dog() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let stranger = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;

    let response = app
        .post(
            &format!("/consultants/{}/invite", consultant.id),
            &stranger.token,
            json!({ "dog_id": dog_id }),
        )
        .await;
    assert_status!(response, 403);

    // The target must be a consultant.
    let response = app
        .post(
            &format!("/consultants/{}/invite", stranger.id),
            &owner.token,
            json!({ "dog_id": dog_id }),
        )
        .await;
    assert_status!(response, 404);

    // Consultants lack CONSULTANTS_INVITE.
    let response = app
        .post(
            &format!("/consultants/{}/invite", consultant.id),
            &consultant.token,
            json!({ "dog_id": dog_id }),
        )
        .await;
    assert_status!(response, 403);
}

#[tokio::test]
#[serial]
async fn invite_notification_is_queued_without_the_token() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let invite = app.invite(&owner, &consultant, dog_id).await;

    // Stand-in for the mailer: drain queued invite notifications in batches.
    let mut conn = app.db_pool.get().unwrap();
    let mut ours = None;
    loop {
        let batch = OutboxService::fetch_unpublished(&mut conn, Some(EventType::InviteCreated), 100)
            .unwrap();
        if batch.is_empty() {
            break;
        }
        if let Some(event) = batch.iter().find(|e| e.aggregate_id == invite.id) {
            ours = Some(event.clone());
        }
        let ids: Vec<Uuid> = batch.iter().map(|e| e.id).collect();
        assert_eq!(OutboxService::mark_published(&mut conn, &ids).unwrap(), ids.len());
    }

    let ours = ours.expect("invite.created queued");
    assert_eq!(ours.payload["data"]["consultant_id"], consultant.id.to_string());
    assert_eq!(ours.payload["data"]["dog_id"], dog_id.to_string());
    assert!(!ours.payload.to_string().contains(&invite.token));
    assert_eq!(app.outbox_count("invite.created", invite.id), 1);
}

#[tokio::test]
#[serial]
async fn access_from_invite_unlocks_events_and_comments() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;
    let event_id = app.create_event(&owner, dog_id, "walk", "Morning").await;

    let response = app.get(&format!("/events/{event_id}"), &consultant.token).await;
    assert_status!(response, 403);

    let invite = app.invite(&owner, &consultant, dog_id).await;
    let response = app.accept(&consultant, &invite.token).await;
    assert_status!(response, 200);

    let response = app.get(&format!("/events/{event_id}"), &consultant.token).await;
    assert_status!(response, 200);

    let response = app.get("/events", &consultant.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pagination"]["total_count"], 1);

    app.create_event(&consultant, dog_id, "training", "Recall drills").await;
}

#[tokio::test]
#[serial]
async fn admin_invite_is_recorded_under_the_dog_owner() {
    let app = TestApp::spawn().await;
    let owner = app.owner().await;
    let admin = app.admin().await;
    let consultant = app.consultant().await;
    let dog_id = app.create_dog(&owner, "Rex").await;

    let response = app
        .post(
            &format!("/consultants/{}/invite", consultant.id),
            &admin.token,
            json!({ "dog_id": dog_id }),
        )
        .await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invite"]["owner_id"], owner.id.to_string());

    let invite_id: Uuid = body["invite"]["id"].as_str().unwrap().parse().unwrap();
    let mut conn = app.db_pool.get().unwrap();
    let event: OutboxEvent = outbox_events::table
        .filter(outbox_events::aggregate_id.eq(invite_id))
        .filter(outbox_events::event_type.eq(EventType::InviteCreated.as_str()))
        .select(OutboxEvent::as_select())
        .first(&mut conn)
        .unwrap();
    assert_eq!(event.payload["metadata"]["actor_id"], admin.id.to_string());
}
