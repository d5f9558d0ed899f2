mod common;

use common::{cover_letter, TestApp};
use mentorlink::auth::{ApprovalStatus, Role};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn request_approve_and_rerequest_after_end() {
    let app = TestApp::spawn().await;
    let student = app.approved("Sam", Role::Student).await;
    let ada = app.approved("Ada", Role::Alumni).await;
    let bob = app.approved("Bob", Role::Alumni).await;

    let res = app
        .post(&student, "/match/request", json!({ "alumniId": ada.id, "coverLetter": cover_letter(120) }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let request: Value = res.json().await.unwrap();
    assert_eq!(request["status"], "pending");

    let res = app.post(&ada, &format!("/match/{}/approve", request["id"]), Value::Null).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: Value = res.json().await.unwrap();
    assert_eq!(outcome["request"]["status"], "approved");
    assert_eq!(outcome["match"]["status"], "active");
    let match_id = outcome["match"]["id"].as_i64().unwrap();

    let active: Value = app.get(&student, "/match/active").await.json().await.unwrap();
    assert_eq!(active[0]["id"], match_id);

    let second = json!({ "alumniId": bob.id, "coverLetter": cover_letter(120) });
    let res = app.post(&student, "/match/request", second.clone()).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "conflict");

    let res = app.post(&student, &format!("/match/{match_id}/end"), Value::Null).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ended: Value = res.json().await.unwrap();
    assert_eq!(ended["status"], "completed");

    let res = app.post(&student, "/match/request", second).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn concurrent_approvals_activate_exactly_one_match() {
    let app = TestApp::spawn().await;
    let student = app.approved("Sam", Role::Student).await;
    let ada = app.approved("Ada", Role::Alumni).await;
    let bob = app.approved("Bob", Role::Alumni).await;

    let mut request_ids = Vec::new();
    for alumni in [&ada, &bob] {
        let request: Value = app
            .post(&student, "/match/request", json!({ "alumniId": alumni.id, "coverLetter": cover_letter(80) }))
            .await
            .json()
            .await
            .unwrap();
        request_ids.push(request["id"].as_i64().unwrap());
    }

    let ada_path = format!("/match/{}/approve", request_ids[0]);
    let bob_path = format!("/match/{}/approve", request_ids[1]);
    let (first, second) = tokio::join!(
        app.post(&ada, &ada_path, Value::Null),
        app.post(&bob, &bob_path, Value::Null),
    );

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, [200, 409]);

    let active: Vec<Value> = app.get(&student, "/match/active").await.json().await.unwrap();
    assert_eq!(active.len(), 1);

    let requests: Vec<Value> = app.get(&student, "/match/requests").await.json().await.unwrap();
    let mut request_statuses: Vec<&str> =
        requests.iter().map(|r| r["status"].as_str().unwrap()).collect();
    request_statuses.sort();
    assert_eq!(request_statuses, vec!["approved", "pending"]);
}

#[tokio::test]
async fn validation_and_auth_statuses() {
    let app = TestApp::spawn().await;
    let student = app.approved("Sam", Role::Student).await;
    let ada = app.approved("Ada", Role::Alumni).await;
    let waiting = app.user("Pia", Role::Student, ApprovalStatus::Pending).await;

    let res = app
        .post(&student, "/match/request", json!({ "alumniId": ada.id, "coverLetter": "too short" }))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .post(&waiting, "/match/request", json!({ "alumniId": ada.id, "coverLetter": cover_letter(80) }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.client.get(app.url("/match/active")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.post(&ada, "/match/4242/approve", Value::Null).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_cancels_match() {
    let app = TestApp::spawn().await;
    let student = app.approved("Sam", Role::Student).await;
    let ada = app.approved("Ada", Role::Alumni).await;
    let admin = app.approved("Root", Role::Admin).await;
    let matched = app.activate(&student, &ada).await;
    let path = format!("/admin/matches/{}/cancel", matched["id"]);

    let res = app.post(&ada, &path, Value::Null).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.post(&admin, &path, Value::Null).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let active: Vec<Value> = app.get(&student, "/match/active").await.json().await.unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn profiles_feed_candidate_ranking() {
    let app = TestApp::spawn().await;
    let student = app.approved("Sam", Role::Student).await;
    let ada = app.approved("Ada", Role::Alumni).await;
    let bob = app.approved("Bob", Role::Alumni).await;

    let put = |user: &common::TestUser, body: Value| {
        app.client.put(app.url("/profile")).bearer_auth(&user.token).json(&body).send()
    };

    let res = put(&student, json!({ "kind": "student", "interests": ["Rust", "SQL"] })).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = put(&bob, json!({ "kind": "alumni", "expertise": ["rust", "sql"] })).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = put(&ada, json!({ "kind": "student", "interests": [] })).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let ranked: Vec<Value> = app.get(&student, "/match/candidates").await.json().await.unwrap();
    assert_eq!(ranked[0]["alumniId"], bob.id);
    assert_eq!(ranked[0]["score"], 50);
    assert_eq!(ranked[1]["alumniId"], ada.id);
}
