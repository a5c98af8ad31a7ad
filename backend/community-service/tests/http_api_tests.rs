mod common;

use actix_web::{http::StatusCode, test, App};
use common::Harness;
use community_service::models::{MessageResponse, ReactionResponse, Spector};
use serde_json::{json, Value};
use uuid::Uuid;

macro_rules! app {
    ($harness:expr) => {{
        let state = $harness.state.clone();
        test::init_service(
            App::new()
                .wrap(state.auth())
                .configure(move |cfg| state.configure(cfg)),
        )
        .await
    }};
}

#[actix_rt::test]
async fn test_mutations_require_access_token() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/spectors")
        .set_json(json!({"name": "rust"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 401);

    let req = test::TestRequest::get().uri("/api/spectors").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_refresh_token_cannot_post() {
    let harness = Harness::new();
    let app = app!(harness);
    let pair = harness.codec.issue_pair("a@x.com", Uuid::new_v4()).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/spectors")
        .insert_header(("Authorization", format!("Bearer {}", pair.refresh_token)))
        .set_json(json!({"name": "rust"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_spector_thread_and_reaction_flow() {
    let harness = Harness::new();
    let app = app!(harness);
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/spectors")
        .insert_header(("Authorization", harness.bearer(owner)))
        .set_json(json!({"name": "rust", "description": "crabs"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let spector: Spector = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/spectors/{}/subscribers", spector.id))
        .insert_header(("Authorization", harness.bearer(member)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"answer": true}));

    // Members may not start threads.
    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(("Authorization", harness.bearer(member)))
        .set_json(json!({"spector_id": spector.id, "body": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(("Authorization", harness.bearer(owner)))
        .set_json(json!({"spector_id": spector.id, "body": "welcome"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let thread: MessageResponse = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(("Authorization", harness.bearer(member)))
        .set_json(json!({
            "spector_id": spector.id,
            "parent_message_id": thread.id,
            "body": "thanks"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages?parent_message_id={}", thread.id))
        .to_request();
    let replies: Vec<MessageResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].user_id, member);

    let req = test::TestRequest::post()
        .uri(&format!("/api/messages/{}/reactions?reaction_type=LOVE", thread.id))
        .insert_header(("Authorization", harness.bearer(member)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let reaction: ReactionResponse = test::read_body_json(resp).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages/{}/reactions", thread.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["type"], "LOVE");

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/messages/{}/reactions/{}",
            thread.id, reaction.id
        ))
        .insert_header(("Authorization", harness.bearer(owner)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Only creator can delete a reaction");

    let kinds: Vec<&str> = harness
        .events()
        .await
        .iter()
        .map(|event| event.kind())
        .collect();
    assert_eq!(kinds, vec!["new_post", "new_comment", "new_reaction"]);
}

#[actix_rt::test]
async fn test_unknown_message_is_404() {
    let harness = Harness::new();
    let app = app!(harness);
    let id = Uuid::new_v4();

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        format!("Message with id \"{}\" doesn't exist", id)
    );
}

#[actix_rt::test]
async fn test_subscribers_lists_names() {
    let harness = Harness::new();
    let app = app!(harness);
    let owner = Uuid::new_v4();
    harness.directory.insert(owner, "Owner", "owner@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/spectors")
        .insert_header(("Authorization", harness.bearer(owner)))
        .set_json(json!({"name": "rust"}))
        .to_request();
    let spector: Spector = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/spectors/{}/subscribers", spector.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!([{"id": owner, "name": "Owner"}]));
}
