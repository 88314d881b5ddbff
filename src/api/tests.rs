use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{router, AppState};
use crate::auth::TokenSigner;
use crate::config::ServerConfig;
use crate::storage::Database;
use crate::users::{self, accounts, Role, User};

struct TestApp {
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let db = Database::in_memory().unwrap();
        let signer = TokenSigner::new(b"router-test-secret", 1).unwrap();
        let state = AppState::new(db, signer, ServerConfig::default());
        Self {
            router: router(state.clone()),
            state,
        }
    }

    /// Insert an account directly and return it with a valid token.
    fn account(&self, username: &str, role: Role) -> (User, String) {
        let user = accounts::prepare_account(username, &format!("{}@example.com", username), "correct horse", role).unwrap();
        self.state.db.write(|tx| users::storage::insert(tx, &user)).unwrap();
        let token = self.state.signer.issue(&user).unwrap();
        (user, token)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}

fn basic_card(question: &str, answer: &str) -> Value {
    json!({ "question": question, "answer": answer })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_register_login_me() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ada", "email": "Ada@Example.com", "password": "analytical" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "student");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "login": "ada@example.com", "password": "analytical" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ada");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "login": "ada", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_admin_role() {
    let app = TestApp::new();
    let body = json!({ "username": "grace", "email": "grace@example.com", "password": "compilers" });
    let (status, _) = app.send(Method::POST, "/api/auth/register", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.send(Method::POST, "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "root", "email": "root@example.com", "password": "compilers", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_change_password_then_login() {
    let app = TestApp::new();
    let (_, token) = app.account("grace", Role::Student);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "wrong guess", "newPassword": "cobol forever" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/auth/password",
            Some(&token),
            Some(json!({ "currentPassword": "correct horse", "newPassword": "cobol forever" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "login": "grace", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "login": "grace", "password": "cobol forever" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "grace");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.send(Method::GET, "/api/decks", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_need_admin() {
    let app = TestApp::new();
    let (_, student) = app.account("student1", Role::Student);
    let (_, admin) = app.account("admin1", Role::Admin);

    let (status, _) = app.send(Method::GET, "/api/admin/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::GET, "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);

    let (status, body) = app
        .send(Method::PUT, "/api/admin/settings", Some(&admin), Some(json!({ "registrationOpen": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registrationOpen"], false);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "late", "email": "late@example.com", "password": "too late now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deck_class_and_study_flow() {
    let app = TestApp::new();
    let (_, teacher) = app.account("mme_curie", Role::Teacher);
    let (student, student_token) = app.account("pierre", Role::Student);

    let (status, deck) = app
        .send(Method::POST, "/api/decks", Some(&teacher), Some(json!({ "name": "Elements" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let deck_id = deck["id"].as_str().unwrap().to_string();

    let (status, card) = app
        .send(
            Method::POST,
            &format!("/api/decks/{}/cards", deck_id),
            Some(&teacher),
            Some(basic_card("Symbol for radium?", "Ra")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let card_id = card["id"].as_str().unwrap().to_string();

    // Not yet shared with the student
    let rating = json!({ "cardId": card_id, "rating": 5 });
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/progress/{}/ratings", deck_id),
            Some(&student_token),
            Some(rating.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, class) = app
        .send(Method::POST, "/api/classes", Some(&teacher), Some(json!({ "name": "Chemistry" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let class_id = class["id"].as_str().unwrap().to_string();
    let join_code = class["joinCode"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/classes/join",
            Some(&student_token),
            Some(json!({ "joinCode": join_code.to_lowercase() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, class) = app
        .send(
            Method::POST,
            &format!("/api/classes/{}/decks", class_id),
            Some(&teacher),
            Some(json!({ "deckId": deck_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(class["studentIds"][0], student.id.to_string());

    let (status, queue) = app
        .send(Method::GET, &format!("/api/study/{}/queue", deck_id), Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue[0]["reason"], "new");

    let (status, progress) = app
        .send(
            Method::POST,
            &format!("/api/progress/{}/ratings", deck_id),
            Some(&student_token),
            Some(rating),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["masteryPercentage"], 100.0);
    assert_eq!(progress["cardsStudied"], 1);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/progress/{}/ratings", deck_id),
            Some(&student_token),
            Some(json!({ "cardId": card_id, "rating": 9 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, report) = app
        .send(Method::GET, &format!("/api/classes/{}/progress", class_id), Some(&teacher), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["students"][0]["username"], "pierre");

    let (status, _) = app
        .send(Method::GET, &format!("/api/classes/{}/progress", class_id), Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_assignment_submission() {
    let app = TestApp::new();
    let (_, teacher) = app.account("teach", Role::Teacher);
    let (student, student_token) = app.account("learner", Role::Student);

    let (_, deck) = app
        .send(Method::POST, "/api/decks", Some(&teacher), Some(json!({ "name": "Capitals" })))
        .await;
    let deck_id = deck["id"].as_str().unwrap().to_string();
    let (_, card) = app
        .send(
            Method::POST,
            &format!("/api/decks/{}/cards", deck_id),
            Some(&teacher),
            Some(basic_card("Capital of Peru?", "Lima")),
        )
        .await;
    let card_id = card["id"].as_str().unwrap().to_string();

    let (_, class) = app
        .send(Method::POST, "/api/classes", Some(&teacher), Some(json!({ "name": "Geography" })))
        .await;
    let class_id = class["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/classes/{}/students", class_id),
            Some(&teacher),
            Some(json!({ "studentId": student.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Creating the assignment links the deck to the class
    let due = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let (status, assignment) = app
        .send(
            Method::POST,
            &format!("/api/classes/{}/assignments", class_id),
            Some(&teacher),
            Some(json!({ "deckId": deck_id, "title": "Week 1", "dueDate": due })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assignment["requiredMastery"], 80.0);
    let assignment_id = assignment["id"].as_str().unwrap().to_string();

    let submit = format!("/api/assignments/{}/submit", assignment_id);
    let (status, result) = app.send(Method::POST, &submit, Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "incomplete");

    app.send(
        Method::POST,
        &format!("/api/progress/{}/ratings", deck_id),
        Some(&student_token),
        Some(json!({ "cardId": card_id, "rating": 5 })),
    )
    .await;

    let (status, result) = app.send(Method::POST, &submit, Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "completed");

    let (status, list) = app.send(Method::GET, "/api/assignments", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["status"], "completed");

    let (status, _) = app.send(Method::POST, &submit, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
