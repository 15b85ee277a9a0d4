// End-to-end tenant flows against a real database. Skipped when
// TEST_DATABASE_URL (or the default local URL) is unreachable.

mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use chrono::{Days, Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{create_test_app, get, login, post, send, unique_email, TestDatabase, TEST_PASSWORD};
use gym_manager::auth::UserRole;
use gym_manager::models::CreateUser;
use gym_manager::services::{SubscriptionService, UserService};
use gym_manager::AppError;

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().expect("id in response").to_string()
}

/// Register a gym owner through the API and return their access token.
async fn register_owner(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": unique_email("owner"),
            "password": TEST_PASSWORD,
            "full_name": "Casey Owner"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"]["password_hash"].is_null());

    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn create_gym(app: &Router, owner: &str) -> String {
    let (status, body) = post(
        app,
        "/api/v1/owners/gyms",
        owner,
        json!({ "name": format!("Iron Temple {}", Uuid::new_v4().simple()) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

/// OG plan created by a fresh platform operator. Returns (og token, plan id).
async fn og_plan(app: &Router, db: &TestDatabase, max_members: Option<i32>) -> (String, String) {
    let og = db.create_user(UserRole::Og, None).await;
    let og_token = login(app, &og.email).await;

    let (status, body) = post(
        app,
        "/api/v1/platform_admin/og-plans",
        &og_token,
        json!({
            "name": format!("Studio {}", Uuid::new_v4().simple()),
            "price_cents": 4900,
            "duration_days": 30,
            "max_members": max_members
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (og_token, id_of(&body))
}

/// Owner with a subscribed gym. Returns (owner token, gym id, og token).
async fn subscribed_gym(app: &Router, db: &TestDatabase, max_members: Option<i32>) -> (String, String, String) {
    let owner = register_owner(app).await;
    let gym_id = create_gym(app, &owner).await;
    let (og_token, plan_id) = og_plan(app, db, max_members).await;

    let (status, body) = post(
        app,
        &format!("/api/v1/owners/gyms/{}/subscription", gym_id),
        &owner,
        json!({ "og_plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    (owner, gym_id, og_token)
}

async fn put(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

async fn delete(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::DELETE, uri, Some(token), None).await
}

fn days_from_today(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days)).to_string()
}

/// Employee created by the owner. Returns (user id, email).
async fn create_employee(app: &Router, owner: &str, gym_id: &str, role: &str) -> (String, String) {
    let email = unique_email(role);
    let (status, body) = post(
        app,
        &format!("/api/v1/owners/gyms/{}/staff", gym_id),
        owner,
        json!({ "email": email, "password": TEST_PASSWORD, "full_name": "Taylor Employee", "role": role }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (id_of(&body), email)
}

async fn create_plan(app: &Router, owner: &str, gym_id: &str) -> String {
    let (status, body) = post(
        app,
        &format!("/api/v1/owners/gyms/{}/plans", gym_id),
        owner,
        json!({ "name": "Monthly", "price_cents": 3500, "duration_days": 30 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

/// Member account created by the owner. Returns (user id, email).
async fn create_member(app: &Router, owner: &str, gym_id: &str) -> (String, String) {
    let email = unique_email("member");
    let (status, body) = post(
        app,
        &format!("/api/v1/owners/gyms/{}/members", gym_id),
        owner,
        json!({ "email": email, "password": TEST_PASSWORD, "full_name": "Jordan Member" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (id_of(&body), email)
}

#[tokio::test]
async fn test_subscription_gates_gym_operations() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());

    let owner = register_owner(&app).await;
    let gym_id = create_gym(&app, &owner).await;

    let (status, body) = get(&app, &format!("/api/v1/owners/gyms/{}/plans", gym_id), &owner).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["message"], "Gym has no active subscription");

    // The gym record and its billing stay reachable while unpaid.
    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}", gym_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = get(&app, &format!("/api/v1/owners/gyms/{}/subscription", gym_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (og_token, plan_id) = og_plan(&app, &db, None).await;
    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/subscription", gym_id),
        &owner,
        json!({ "og_plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subscription_id = id_of(&body);

    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}/plans", gym_id), &owner).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/api/v1/platform_admin/subscriptions/{}/cancel", subscription_id),
        &og_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}/plans", gym_id), &owner).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    // The platform operator is never gated by billing.
    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}/plans", gym_id), &og_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_member_limit_of_the_og_plan() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, Some(1)).await;

    create_member(&app, &owner, &gym_id).await;

    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/members", gym_id),
        &owner,
        json!({ "email": unique_email("member"), "password": TEST_PASSWORD, "full_name": "Second Member" }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["message"], "The gym's plan allows at most 1 members");
}

#[tokio::test]
async fn test_membership_lifecycle_and_check_in() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;
    let (member_id, member_email) = create_member(&app, &owner, &gym_id).await;
    let member = login(&app, &member_email).await;

    let (status, body) = post(&app, "/api/v1/members/attendance/check-in", &member, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "No active membership covers today");

    let memberships = format!("/api/v1/owners/gyms/{}/memberships", gym_id);
    let (status, body) = post(
        &app,
        &memberships,
        &owner,
        json!({ "user_id": member_id, "plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let membership_id = id_of(&body);

    let today = Utc::now().date_naive();
    let end = today.checked_add_days(Days::new(29)).unwrap();
    assert_eq!(body["data"]["start_date"], today.to_string());
    assert_eq!(body["data"]["end_date"], end.to_string());

    let (status, _) = post(
        &app,
        &memberships,
        &owner,
        json!({ "user_id": member_id, "plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{}/{}/renew", memberships, membership_id),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let next_start = end.checked_add_days(Days::new(1)).unwrap();
    assert_eq!(body["data"]["start_date"], next_start.to_string());
    assert_ne!(id_of(&body), membership_id);

    let (status, body) = get(&app, "/api/v1/members/memberships/active", &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], membership_id.as_str());

    let (status, _) = post(&app, "/api/v1/members/attendance/check-in", &member, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post(&app, "/api/v1/members/attendance/check-in", &member, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(&app, "/api/v1/members/attendance/check-out", &member, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["check_out_at"].is_string());

    let (status, body) = get(&app, "/api/v1/members/attendance", &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = post(
        &app,
        &format!("{}/{}/cancel", memberships, membership_id),
        &owner,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_staff_work_within_their_permissions() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;

    let staff_email = unique_email("staff");
    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/staff", gym_id),
        &owner,
        json!({
            "email": staff_email,
            "password": TEST_PASSWORD,
            "full_name": "Sam Frontdesk",
            "role": "staff"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let staff = login(&app, &staff_email).await;

    let (status, body) = post(
        &app,
        "/api/v1/staff/members",
        &staff,
        json!({ "email": unique_email("member"), "password": TEST_PASSWORD, "full_name": "Riley Member" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let member_id = id_of(&body);
    assert_eq!(body["data"]["gym_id"], gym_id.as_str());

    let (status, body) = post(
        &app,
        "/api/v1/staff/memberships",
        &staff,
        json!({ "user_id": member_id, "plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let membership_id = id_of(&body);

    let (status, body) = post(
        &app,
        "/api/v1/staff/payments",
        &staff,
        json!({
            "user_id": member_id,
            "membership_id": membership_id,
            "amount_cents": 3500,
            "method": "cash"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "completed");

    let (status, body) = get(&app, "/api/v1/staff/dashboard", &staff).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revenue_this_month_cents"], 3500);

    // Announcements are written by owners and trainers by default.
    let (status, _) = post(
        &app,
        "/api/v1/staff/announcements",
        &staff,
        json!({ "title": "Closed Monday", "body": "Maintenance day" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&app, "/api/v1/owners/gyms", &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get(&app, "/api/v1/members/gym", &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_trainers_only_see_assigned_members() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;

    let trainer_email = unique_email("trainer");
    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/staff", gym_id),
        &owner,
        json!({
            "email": trainer_email,
            "password": TEST_PASSWORD,
            "full_name": "Alex Coach",
            "role": "trainer"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let trainer_id = id_of(&body);
    let trainer = login(&app, &trainer_email).await;

    let (assigned_id, _) = create_member(&app, &owner, &gym_id).await;
    let (other_id, _) = create_member(&app, &owner, &gym_id).await;
    let memberships = format!("/api/v1/owners/gyms/{}/memberships", gym_id);
    let (status, _) = post(
        &app,
        &memberships,
        &owner,
        json!({ "user_id": assigned_id, "plan_id": plan_id, "trainer_id": trainer_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post(
        &app,
        &memberships,
        &owner,
        json!({ "user_id": other_id, "plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(&app, "/api/v1/trainers/members", &trainer).await;
    assert_eq!(status, StatusCode::OK);
    let members = body["data"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["id"], assigned_id.as_str());

    let (status, _) = get(&app, &format!("/api/v1/trainers/members/{}/attendance", assigned_id), &trainer).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, &format!("/api/v1/trainers/members/{}/attendance", other_id), &trainer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(
        &app,
        "/api/v1/trainers/announcements",
        &trainer,
        json!({ "title": "New class", "body": "Kettlebells on Fridays", "audience": "members" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Member-only announcements are not shown to trainers.
    let (status, body) = get(&app, "/api/v1/trainers/announcements", &trainer).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_owners_cannot_reach_other_tenants() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (_, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let intruder = register_owner(&app).await;

    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}", gym_id), &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}/members", gym_id), &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&app, "/api/v1/owners/gyms", &intruder).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = get(&app, "/api/v1/platform_admin/gyms", &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deactivated_gym_locks_out_its_users() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, og_token) = subscribed_gym(&app, &db, None).await;
    let (_, member_email) = create_member(&app, &owner, &gym_id).await;
    let member = login(&app, &member_email).await;

    let (status, _) = get(&app, "/api/v1/members/gym", &member).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        &format!("/api/v1/platform_admin/gyms/{}/deactivate", gym_id),
        &og_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = get(&app, "/api/v1/members/gym", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Gym has been deactivated");
    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}", gym_id), &owner).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_revokes_the_access_token() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let owner = register_owner(&app).await;

    let (status, _) = get(&app, "/api/v1/auth/me", &owner).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, "/api/v1/auth/me", &owner).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_membership_updates_cannot_overlap_the_next_period() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;
    let (member_id, _) = create_member(&app, &owner, &gym_id).await;

    let memberships = format!("/api/v1/owners/gyms/{}/memberships", gym_id);
    let (_, body) = post(&app, &memberships, &owner, json!({ "user_id": member_id, "plan_id": plan_id })).await;
    let current = format!("{}/{}", memberships, id_of(&body));
    let (status, body) = send(&app, Method::POST, &format!("{}/renew", current), Some(&owner), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["start_date"], days_from_today(30));

    let (status, body) = put(&app, &current, &owner, json!({ "end_date": days_from_today(60) })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Overlapping membership already exists");

    let (status, body) = put(&app, &current, &owner, json!({ "end_date": days_from_today(10) })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["end_date"], days_from_today(10));

    let (status, body) = put(&app, &current, &owner, json!({ "status": "frozen" })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "frozen");
    let (status, body) = put(&app, &current, &owner, json!({ "status": "active" })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "active");
}

#[tokio::test]
async fn test_expired_membership_must_be_renewed() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;
    let (member_id, _) = create_member(&app, &owner, &gym_id).await;

    let memberships = format!("/api/v1/owners/gyms/{}/memberships", gym_id);
    let (status, body) = post(
        &app,
        &memberships,
        &owner,
        json!({ "user_id": member_id, "plan_id": plan_id, "start_date": days_from_today(-60) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let lapsed = format!("{}/{}", memberships, id_of(&body));

    let (status, body) = get(&app, &lapsed, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "expired");

    for target in ["frozen", "active"] {
        let (status, body) = put(&app, &lapsed, &owner, json!({ "status": target })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", target);
        assert_eq!(body["message"], "Membership has expired; renew it instead");
    }
}

#[tokio::test]
async fn test_malformed_requests_use_the_error_envelope() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;

    let (status, body) = get(&app, "/api/v1/owners/gyms/not-a-uuid", &owner).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].is_string());

    let (status, body) = get(&app, "/api/v1/owners/gyms?limit=plenty", &owner).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/memberships", gym_id),
        &owner,
        json!({ "user_id": "nobody", "plan_id": 7 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_staff_listing_pages_across_roles() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let (staff_id, _) = create_employee(&app, &owner, &gym_id, "staff").await;
    let (trainer_id, _) = create_employee(&app, &owner, &gym_id, "trainer").await;
    create_member(&app, &owner, &gym_id).await;

    let staff = format!("/api/v1/owners/gyms/{}/staff", gym_id);
    let (status, body) = get(&app, &staff, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, first) = get(&app, &format!("{}?limit=1", staff), &owner).await;
    let (_, second) = get(&app, &format!("{}?limit=1&offset=1", staff), &owner).await;
    let first = first["data"].as_array().unwrap();
    let second = second["data"].as_array().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);

    let mut seen = vec![
        first[0]["id"].as_str().unwrap().to_string(),
        second[0]["id"].as_str().unwrap().to_string(),
    ];
    seen.sort();
    let mut expected = vec![staff_id, trainer_id.clone()];
    expected.sort();
    assert_eq!(seen, expected);

    let (_, body) = get(&app, &format!("{}?role=trainer", staff), &owner).await;
    let trainers = body["data"].as_array().unwrap();
    assert_eq!(trainers.len(), 1);
    assert_eq!(trainers[0]["id"], trainer_id.as_str());

    let (_, body) = get(&app, &format!("{}?role=member", staff), &owner).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_gym_and_plan_updates_round_trip() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let gym = format!("/api/v1/owners/gyms/{}", gym_id);

    let name = format!("Renamed {}", Uuid::new_v4().simple());
    let (status, body) = put(
        &app,
        &gym,
        &owner,
        json!({ "name": name, "address": "12 Harbour Road", "email": "desk@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = get(&app, &gym, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], name.as_str());
    assert_eq!(body["data"]["address"], "12 Harbour Road");
    assert_eq!(body["data"]["email"], "desk@example.com");

    let plan = format!("{}/plans/{}", gym, create_plan(&app, &owner, &gym_id).await);
    let (status, body) = put(
        &app,
        &plan,
        &owner,
        json!({ "price_cents": 4200, "description": "Unlimited classes", "duration_days": 90 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = get(&app, &plan, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Monthly");
    assert_eq!(body["data"]["price_cents"], 4200);
    assert_eq!(body["data"]["description"], "Unlimited classes");
    assert_eq!(body["data"]["duration_days"], 90);
    assert_eq!(body["data"]["is_active"], true);
}

#[tokio::test]
async fn test_subscription_lapses_on_its_end_date() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let owner = register_owner(&app).await;
    let gym_id = create_gym(&app, &owner).await;
    let (og_token, plan_id) = og_plan(&app, &db, None).await;

    let (status, body) = post(
        &app,
        "/api/v1/platform_admin/subscriptions",
        &og_token,
        json!({ "gym_id": gym_id, "og_plan_id": plan_id, "start_date": days_from_today(-40) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["end_date"], days_from_today(-11));

    let plans = format!("/api/v1/owners/gyms/{}/plans", gym_id);
    let (status, body) = get(&app, &plans, &owner).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(
        body["message"],
        format!("Gym subscription expired on {}", days_from_today(-11))
    );

    let (status, body) = get(&app, &format!("/api/v1/owners/gyms/{}/subscription", gym_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);
    assert_eq!(body["data"]["subscription"]["status"], "expired");

    // A lapsed gym starts its next period today.
    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/subscription", gym_id),
        &owner,
        json!({ "og_plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["start_date"], days_from_today(0));

    let (status, _) = get(&app, &plans, &owner).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_subscription_purchases_stack() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let (_, plan_id) = og_plan(&app, &db, None).await;

    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/subscription", gym_id),
        &owner,
        json!({ "og_plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["start_date"], days_from_today(30));
    assert_eq!(body["data"]["end_date"], days_from_today(59));

    let (_, body) = get(&app, &format!("/api/v1/owners/gyms/{}/subscription", gym_id), &owner).await;
    assert_eq!(body["data"]["subscription"]["start_date"], days_from_today(0));
}

#[tokio::test]
async fn test_concurrent_purchases_do_not_overlap() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let owner = register_owner(&app).await;
    let gym_id = Uuid::parse_str(&create_gym(&app, &owner).await).unwrap();
    let (_, plan_id) = og_plan(&app, &db, None).await;
    let plan_id = Uuid::parse_str(&plan_id).unwrap();

    let subscriptions = SubscriptionService::new(db.pool.clone());
    let today = Utc::now().date_naive();
    let (first, second) = tokio::join!(
        subscriptions.subscribe(gym_id, plan_id, None, today),
        subscriptions.subscribe(gym_id, plan_id, None, today),
    );

    let mut periods = vec![first.unwrap(), second.unwrap()];
    periods.sort_by_key(|s| s.start_date);
    assert_eq!(periods[0].start_date, today);
    assert!(periods[1].start_date > periods[0].end_date);
}

#[tokio::test]
async fn test_concurrent_enrolments_respect_the_member_limit() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (_, gym_id, _) = subscribed_gym(&app, &db, Some(1)).await;
    let gym_id = Uuid::parse_str(&gym_id).unwrap();

    let users = UserService::new(db.pool.clone());
    let member = |name: &str| CreateUser {
        email: unique_email("member"),
        password: TEST_PASSWORD.to_string(),
        full_name: name.to_string(),
        phone: None,
        role: UserRole::Member,
        gym_id: Some(gym_id),
    };
    let (first, second) = tokio::join!(
        users.create_member(member("Morgan First"), Some(1)),
        users.create_member(member("Quinn Second"), Some(1)),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::SubscriptionLimitReached(_)))));
}

#[tokio::test]
async fn test_payment_can_only_be_refunded_once() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let (member_id, _) = create_member(&app, &owner, &gym_id).await;

    let (status, body) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/payments", gym_id),
        &owner,
        json!({ "user_id": member_id, "amount_cents": 2000, "method": "card" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let refund = format!("/api/v1/owners/gyms/{}/payments/{}/refund", gym_id, id_of(&body));

    let (status, body) = post(&app, &refund, &owner, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "refunded");

    let (status, body) = post(&app, &refund, &owner, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment is already refunded");
}

#[tokio::test]
async fn test_deleting_a_plan_in_use_retires_it() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plans = format!("/api/v1/owners/gyms/{}/plans", gym_id);
    let used_plan = create_plan(&app, &owner, &gym_id).await;
    let (member_id, _) = create_member(&app, &owner, &gym_id).await;

    let (status, _) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/memberships", gym_id),
        &owner,
        json!({ "user_id": member_id, "plan_id": used_plan }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = delete(&app, &format!("{}/{}", plans, used_plan), &owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"], "deactivated");
    assert_eq!(body["message"], "Plan is in use and was deactivated");

    let (status, body) = get(&app, &format!("{}/{}", plans, used_plan), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = post(
        &app,
        &plans,
        &owner,
        json!({ "name": "Drop-in", "price_cents": 900, "duration_days": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let unused = format!("{}/{}", plans, id_of(&body));

    let (status, body) = delete(&app, &unused, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "deleted");
    let (status, _) = get(&app, &unused, &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_members_only_read_announcements_meant_for_them() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let (_, member_email) = create_member(&app, &owner, &gym_id).await;
    let member = login(&app, &member_email).await;

    let announcements = format!("/api/v1/owners/gyms/{}/announcements", gym_id);
    for (title, audience) in [("Open day", "all"), ("Yoga waitlist", "members"), ("Shift swap", "staff"), ("Coach sync", "trainers")] {
        let (status, body) = post(
            &app,
            &announcements,
            &owner,
            json!({ "title": title, "body": "Details at the front desk", "audience": audience }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, body) = get(&app, "/api/v1/members/announcements", &member).await;
    assert_eq!(status, StatusCode::OK);
    let mut titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Open day", "Yoga waitlist"]);

    let (_, body) = get(&app, &announcements, &owner).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_deleting_a_gym_detaches_its_users() {
    let Some(db) = TestDatabase::connect().await else { return };
    let app = create_test_app(db.pool.clone());
    let (owner, gym_id, _) = subscribed_gym(&app, &db, None).await;
    let plan_id = create_plan(&app, &owner, &gym_id).await;
    let (member_id, member_email) = create_member(&app, &owner, &gym_id).await;
    let (staff_id, _) = create_employee(&app, &owner, &gym_id, "staff").await;
    let (status, _) = post(
        &app,
        &format!("/api/v1/owners/gyms/{}/memberships", gym_id),
        &owner,
        json!({ "user_id": member_id, "plan_id": plan_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = delete(&app, &format!("/api/v1/owners/gyms/{}", gym_id), &owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let gym_uuid = Uuid::parse_str(&gym_id).unwrap();
    for user_id in [&member_id, &staff_id] {
        let home: Option<Uuid> = sqlx::query_scalar("SELECT gym_id FROM users WHERE id = $1")
            .bind(Uuid::parse_str(user_id).unwrap())
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(home, None);
    }

    for table in ["plans", "memberships", "gym_subscriptions"] {
        let remaining: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE gym_id = $1", table))
            .bind(gym_uuid)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0, "{}", table);
    }

    let (status, _) = get(&app, &format!("/api/v1/owners/gyms/{}", gym_id), &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The detached member can still sign in but reaches no gym.
    let member = login(&app, &member_email).await;
    let (status, _) = get(&app, "/api/v1/members/gym", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
