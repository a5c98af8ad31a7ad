mod common;

use actix_web::{http::StatusCode, test, App};
use common::{Harness, INTERNAL_KEY};
use crypto_core::TokenPair;
use event_schema::DomainEvent;
use identity_service::models::UserResponse;
use serde_json::{json, Value};

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

async fn register_and_login<S>(app: &S, harness: &Harness, email: &str, code: u32) -> TokenPair
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
{
    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({"name": "A", "email": email, "password": "pw"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(app, req).await;
    assert_eq!(body, json!({"answer": true}));
    harness.emitted_codes().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/users/confirm?email={}&code={}", email, code))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/users/authenticate")
        .set_json(json!({"email": email, "password": "pw"}))
        .to_request();
    test::call_and_read_body_json(app, req).await
}

#[actix_rt::test]
async fn test_register_confirm_authenticate_me() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);

    let pair = register_and_login(&app, &harness, "a@x.com", 482913).await;
    assert_eq!(pair.token_type, "Bearer");

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
        .to_request();
    let me: UserResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me.email, "a@x.com");
    assert_eq!(me.name, "A");

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", me.id))
        .to_request();
    let by_id: UserResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_id, me);
}

#[actix_rt::test]
async fn test_me_requires_access_token() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);
    let pair = register_and_login(&app, &harness, "a@x.com", 482913).await;

    let req = test::TestRequest::get().uri("/api/users/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Unauthorized", "status": 401}));

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(("Authorization", format!("Bearer {}", pair.refresh_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_wrong_code_is_bad_request() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({"name": "A", "email": "a@x.com", "password": "pw"}))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/users/confirm?email=a@x.com&code=123456")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Invalid code", "status": 400}));
}

#[actix_rt::test]
async fn test_bad_credentials_are_not_found() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);
    register_and_login(&app, &harness, "a@x.com", 482913).await;

    let req = test::TestRequest::post()
        .uri("/api/users/authenticate")
        .set_json(json!({"email": "a@x.com", "password": "nope"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_refresh_and_logout_over_http() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);
    let pair = register_and_login(&app, &harness, "a@x.com", 482913).await;

    let req = test::TestRequest::post()
        .uri("/api/users/refresh")
        .set_json(json!({"refresh_token": pair.refresh_token}))
        .to_request();
    let rotated: TokenPair = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/users/refresh")
        .set_json(json!({"refresh_token": pair.refresh_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/users/logout")
        .set_json(json!({"refresh_token": rotated.refresh_token}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"answer": true}));

    let req = test::TestRequest::post()
        .uri("/api/users/refresh")
        .set_json(json!({"refresh_token": rotated.refresh_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_update_rules() {
    let harness = Harness::new(&[111111, 222222]);
    let app = app!(harness);
    let pair = register_and_login(&app, &harness, "a@x.com", 111111).await;
    register_and_login(&app, &harness, "b@x.com", 222222).await;
    let bearer = format!("Bearer {}", pair.access_token);

    let req = test::TestRequest::patch()
        .uri("/api/users")
        .insert_header(("Authorization", bearer.clone()))
        .set_json(json!({}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"], "At least one property must be specified");

    let req = test::TestRequest::patch()
        .uri("/api/users")
        .insert_header(("Authorization", bearer.clone()))
        .set_json(json!({"name": "  "}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"], "Property \"name\" cannot be empty string");

    let req = test::TestRequest::patch()
        .uri("/api/users")
        .insert_header(("Authorization", bearer.clone()))
        .set_json(json!({"email": "b@x.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::patch()
        .uri("/api/users")
        .insert_header(("Authorization", bearer))
        .set_json(json!({"name": "Alice"}))
        .to_request();
    let user: UserResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(user.name, "Alice");
    assert_eq!(user.email, "a@x.com");
}

#[actix_rt::test]
async fn test_search_by_name_or_email() {
    let harness = Harness::new(&[111111, 222222]);
    let app = app!(harness);
    register_and_login(&app, &harness, "a@x.com", 111111).await;
    register_and_login(&app, &harness, "b@x.com", 222222).await;

    let req = test::TestRequest::get().uri("/api/users").to_request();
    let all: Vec<UserResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/users?email=b@x.com")
        .to_request();
    let found: Vec<UserResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email, "b@x.com");
}

#[actix_rt::test]
async fn test_delete_publishes_user_deleted_and_revokes_access() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);
    let pair = register_and_login(&app, &harness, "a@x.com", 482913).await;
    let bearer = format!("Bearer {}", pair.access_token);

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(("Authorization", bearer.clone()))
        .to_request();
    let me: UserResponse = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::delete()
        .uri("/api/users")
        .insert_header(("Authorization", bearer.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let events = harness.outbox.drain().await.unwrap();
    assert_eq!(events.len(), 1);
    match &events[0].data {
        DomainEvent::UserDeleted(event) => assert_eq!(event.user_id, me.id),
        other => panic!("unexpected event {other:?}"),
    }

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(("Authorization", bearer))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_rt::test]
async fn test_internal_batch_requires_key() {
    let harness = Harness::new(&[482913]);
    let app = app!(harness);
    register_and_login(&app, &harness, "a@x.com", 482913).await;

    let req = test::TestRequest::get().uri("/api/users").to_request();
    let all: Vec<UserResponse> = test::call_and_read_body_json(&app, req).await;
    let id = all[0].id;

    let req = test::TestRequest::post()
        .uri("/api/users/internal/batch")
        .set_json(json!([id]))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::post()
        .uri("/api/users/internal/batch")
        .insert_header(("x-internal-api-key", INTERNAL_KEY))
        .set_json(json!([id]))
        .to_request();
    let names: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names, json!([{"id": id, "name": "A"}]));

    let req = test::TestRequest::post()
        .uri("/api/users/internal/batchEmail")
        .insert_header(("x-internal-api-key", INTERNAL_KEY))
        .set_json(json!([id]))
        .to_request();
    let emails: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(emails, vec!["a@x.com".to_string()]);
}
