use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use ballotbox_core::{AppConfig, AppState};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("api-test.db");
    let db_url = format!(
        "sqlite://{}?mode=rwc",
        db_path.to_string_lossy().replace('\\', "/")
    );
    let db = ballotbox_db::create_pool(&db_url, 1).await.expect("pool");
    ballotbox_db::run_migrations(&db).await.expect("migrations");
    (
        AppState {
            db,
            config: AppConfig::default(),
        },
        dir,
    )
}

fn app(state: &AppState) -> Router {
    ballotbox_api::build_router().with_state(state.clone())
}

async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn post_form(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// First Set-Cookie header, reduced to the `name=value` pair a client would
/// send back.
fn cookie_pair(resp: &Response) -> String {
    let raw = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie str");
    raw.split(';').next().expect("cookie pair").to_string()
}

fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("location str")
}

async fn follow_notice(router: &Router, resp: Response) -> (Value, String) {
    let target = location(&resp).to_string();
    let cookie = cookie_pair(&resp);
    let followed = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(&target)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("follow");
    assert_eq!(followed.status(), StatusCode::OK);
    (body_json(followed).await, target)
}

async fn register_and_login(router: &Router, username: &str) -> (i64, String) {
    let resp = router
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "username": username, "password": "hunter2hunter2" }),
        ))
        .await
        .expect("register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user = body_json(resp).await;
    let user_id = user["id"].as_i64().expect("user id");

    let resp = router
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            json!({ "username": username, "password": "hunter2hunter2" }),
        ))
        .await
        .expect("login");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let token = body["token"].as_str().expect("token").to_string();
    (user_id, token)
}

async fn seed_poll(
    state: &AppState,
    text: &str,
    pub_offset: Duration,
    choice_texts: &[&str],
) -> (i64, Vec<i64>) {
    let question = ballotbox_db::questions::create_question(
        &state.db,
        text,
        Utc::now() + pub_offset,
        None,
        None,
    )
    .await
    .expect("question");
    let mut choice_ids = Vec::new();
    for choice_text in choice_texts {
        let choice = ballotbox_db::choices::create_choice(&state.db, question.id, choice_text)
            .await
            .expect("choice");
        choice_ids.push(choice.id);
    }
    (question.id, choice_ids)
}

#[tokio::test]
async fn listing_shows_past_questions_and_hides_future_ones() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (past_id, _) = seed_poll(&state, "Past question.", Duration::days(-5), &["Yes"]).await;
    seed_poll(&state, "Future question.", Duration::days(5), &["Yes"]).await;

    let resp = router.oneshot(get("/api/polls")).await.expect("list");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let questions = body["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["id"].as_i64(), Some(past_id));
    assert_eq!(questions[0]["question_text"], "Past question.");
}

#[tokio::test]
async fn listing_tolerates_a_listing_limit_below_one() {
    let (mut state, _dir) = test_state().await;
    state.config.listing_limit = 0;
    let router = app(&state);
    seed_poll(&state, "Past question.", Duration::days(-5), &["Yes"]).await;

    let resp = router.oneshot(get("/api/polls")).await.expect("list");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["questions"].as_array().expect("questions").len(), 1);
}

#[tokio::test]
async fn registering_a_taken_username_conflicts() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    register_and_login(&router, "alice").await;

    let resp = router
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "username": "alice", "password": "hunter2hunter2" }),
        ))
        .await
        .expect("register");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn detail_of_missing_question_redirects_with_notice() {
    let (state, _dir) = test_state().await;
    let router = app(&state);

    let resp = router
        .clone()
        .oneshot(get("/api/polls/42"))
        .await
        .expect("detail");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/api/polls");

    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(body["notice"], "Poll ID 42 does not exist.");
}

#[tokio::test]
async fn detail_of_future_question_redirects_as_unavailable() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (id, _) = seed_poll(&state, "Future question.", Duration::days(5), &["Yes"]).await;

    let resp = router
        .clone()
        .oneshot(get(&format!("/api/polls/{id}")))
        .await
        .expect("detail");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/api/polls");

    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(
        body["notice"],
        format!("Voting is unavailable for Poll ID {id}.")
    );
}

#[tokio::test]
async fn detail_of_open_question_lists_choices() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (id, _) = seed_poll(&state, "Open question?", Duration::days(-5), &["Tea", "Coffee"]).await;

    let resp = router
        .oneshot(get(&format!("/api/polls/{id}")))
        .await
        .expect("detail");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["question"]["question_text"], "Open question?");
    assert_eq!(body["choices"].as_array().expect("choices").len(), 2);
}

#[tokio::test]
async fn results_of_unpublished_question_redirect_as_unavailable() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (id, _) = seed_poll(&state, "Future question.", Duration::days(5), &["Yes"]).await;

    let resp = router
        .clone()
        .oneshot(get(&format!("/api/polls/{id}/results")))
        .await
        .expect("results");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(
        body["notice"],
        format!("Results for Poll ID {id} are unavailable.")
    );
}

#[tokio::test]
async fn vote_requires_authentication() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (id, choice_ids) = seed_poll(&state, "Question?", Duration::days(-1), &["Yes"]).await;

    let resp = router
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            &format!("choice={}", choice_ids[0]),
            None,
        ))
        .await
        .expect("vote");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn vote_without_choice_redirects_to_detail_and_writes_nothing() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (user_id, token) = register_and_login(&router, "voter").await;
    let (id, _) = seed_poll(&state, "Question?", Duration::days(-1), &["Yes", "No"]).await;

    let resp = router
        .clone()
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            "",
            Some(&token),
        ))
        .await
        .expect("vote");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/api/polls/{id}"));

    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(body["notice"], "You didn't select a choice.");

    let vote = ballotbox_db::votes::get_user_vote(&state.db, user_id, id)
        .await
        .expect("lookup");
    assert!(vote.is_none());
}

#[tokio::test]
async fn garbage_choice_id_counts_as_no_selection() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (_, token) = register_and_login(&router, "voter").await;
    let (id, _) = seed_poll(&state, "Question?", Duration::days(-1), &["Yes"]).await;

    let resp = router
        .clone()
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            "choice=not-a-number",
            Some(&token),
        ))
        .await
        .expect("vote");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/api/polls/{id}"));
}

#[tokio::test]
async fn voting_then_revoting_moves_the_single_vote() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (user_id, token) = register_and_login(&router, "voter").await;
    let (id, choice_ids) =
        seed_poll(&state, "Tea or coffee?", Duration::days(-1), &["Tea", "Coffee"]).await;

    // First vote lands on the results page with a "voted" notice.
    let resp = router
        .clone()
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            &format!("choice={}", choice_ids[0]),
            Some(&token),
        ))
        .await
        .expect("first vote");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/api/polls/{id}/results"));
    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(body["notice"], "You voted for 'Tea'.");

    // Second vote reassigns rather than duplicates.
    let resp = router
        .clone()
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            &format!("choice={}", choice_ids[1]),
            Some(&token),
        ))
        .await
        .expect("second vote");
    let (body, _) = follow_notice(&router, resp).await;
    assert_eq!(body["notice"], "Your vote was changed to 'Coffee'.");

    let counts: Vec<i64> = body["choices"]
        .as_array()
        .expect("choices")
        .iter()
        .map(|c| c["votes"].as_i64().expect("votes"))
        .collect();
    assert_eq!(counts, vec![0, 1]);

    let vote = ballotbox_db::votes::get_user_vote(&state.db, user_id, id)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(vote.choice_id, choice_ids[1]);
}

#[tokio::test]
async fn detail_marks_the_requesters_existing_vote() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (_, token) = register_and_login(&router, "voter").await;
    let (id, choice_ids) = seed_poll(&state, "Question?", Duration::days(-1), &["Yes", "No"]).await;

    router
        .clone()
        .oneshot(post_form(
            &format!("/api/polls/{id}/vote"),
            &format!("choice={}", choice_ids[1]),
            Some(&token),
        ))
        .await
        .expect("vote");

    let resp = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/polls/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("detail");
    let body = body_json(resp).await;
    let selected: Vec<bool> = body["choices"]
        .as_array()
        .expect("choices")
        .iter()
        .map(|c| c["selected"].as_bool().expect("selected"))
        .collect();
    assert_eq!(selected, vec![false, true]);
}

#[tokio::test]
async fn login_failure_is_audited_with_forwarded_ip() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    register_and_login(&router, "alice").await;

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .body(Body::from(
                    json!({ "username": "alice", "password": "wrong-password" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("login");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let events =
        ballotbox_db::auth_events::list_events(&state.db, Some("auth.login.failure"), None, 10)
            .await
            .expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].username, "alice");
    assert_eq!(events[0].ip_address.as_deref(), Some("203.0.113.9"));

    let successes =
        ballotbox_db::auth_events::list_events(&state.db, Some("auth.login.success"), None, 10)
            .await
            .expect("successes");
    assert_eq!(successes.len(), 1);
}

#[tokio::test]
async fn logout_revokes_the_session_and_is_audited() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (user_id, token) = register_and_login(&router, "alice").await;

    let resp = router
        .clone()
        .oneshot(post_form("/api/auth/logout", "", Some(&token)))
        .await
        .expect("logout");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // The token is dead now.
    let resp = router
        .oneshot(post_form("/api/auth/logout", "", Some(&token)))
        .await
        .expect("second logout");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let events = ballotbox_db::auth_events::list_events(&state.db, Some("auth.logout"), None, 10)
        .await
        .expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user_id, Some(user_id));
    assert_eq!(events[0].username, "alice");
}

#[tokio::test]
async fn first_user_can_create_polls_later_users_cannot() {
    let (state, _dir) = test_state().await;
    let router = app(&state);
    let (_, admin_token) = register_and_login(&router, "admin").await;
    let (_, member_token) = register_and_login(&router, "member").await;

    let create = |token: String| {
        Request::builder()
            .method("POST")
            .uri("/api/polls")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(
                json!({
                    "question_text": "What's for lunch?",
                    "choices": ["Soup", "Salad"],
                })
                .to_string(),
            ))
            .expect("request")
    };

    let resp = router
        .clone()
        .oneshot(create(admin_token))
        .await
        .expect("admin create");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["choices"].as_array().expect("choices").len(), 2);

    let resp = router
        .oneshot(create(member_token))
        .await
        .expect("member create");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
