//! Board role resolution and permission checks over HTTP.

mod common;

use common::{board_id, FakePeople, TestApp};
use serde_json::{json, Value};
use sidekiq_auth::boards::{Board, ProfileId, Role};

const OWNER_ACCOUNT: i32 = 1;
const MEMBER_ACCOUNT: i32 = 2;
const STRANGER_ACCOUNT: i32 = 3;

fn people() -> FakePeople {
    FakePeople::new()
        .with_account(OWNER_ACCOUNT, &[9])
        .with_account(MEMBER_ACCOUNT, &[20, 21])
        .with_account(STRANGER_ACCOUNT, &[30])
}

/// Root board owned by 9 with a guest and a blocked member, a child board
/// where 20 is an author, and an unrelated board owned by 5.
fn boards() -> Vec<Board> {
    vec![
        Board::new(board_id(1), ProfileId(9))
            .with_member(ProfileId(21), Role::Guest)
            .with_member(ProfileId(30), Role::Blocked),
        Board::new(board_id(2), ProfileId(20))
            .with_parent(board_id(1))
            .with_member(ProfileId(21), Role::Author),
        Board::new(board_id(3), ProfileId(5)),
    ]
}

async fn role_of(app: &TestApp, account: i32, profile: i32, board: u8) -> Value {
    let token = app.token_for(account);
    let response = app
        .get_as(
            &format!("/boards/{}/role", board_id(board)),
            &token,
            profile,
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn owner_of_board_is_owner() {
    let people = FakePeople::new().with_account(4, &[5]);
    let app = TestApp::spawn(people, boards()).await;

    let body = role_of(&app, 4, 5, 3).await;
    assert_eq!(body["role"], "owner");
    assert_eq!(body["profileId"], 5);
    assert_eq!(body["boardId"], board_id(3).to_hex());
}

#[tokio::test]
async fn parent_owner_is_admin_on_child() {
    let app = TestApp::spawn(people(), boards()).await;

    let body = role_of(&app, OWNER_ACCOUNT, 9, 2).await;
    assert_eq!(body["role"], "admin");

    let cached: Value =
        serde_json::from_str(&app.cached_permissions(9).await.unwrap()).unwrap();
    assert_eq!(cached[board_id(2).to_hex()], "admin");
}

#[tokio::test]
async fn direct_role_on_child_beats_inherited_guest() {
    let app = TestApp::spawn(people(), boards()).await;

    assert_eq!(role_of(&app, MEMBER_ACCOUNT, 21, 1).await["role"], "viewer");
    assert_eq!(role_of(&app, MEMBER_ACCOUNT, 21, 2).await["role"], "author");

    let cached: Value =
        serde_json::from_str(&app.cached_permissions(21).await.unwrap()).unwrap();
    assert_eq!(cached[board_id(1).to_hex()], "guest");
    assert_eq!(cached[board_id(2).to_hex()], "author");
}

#[tokio::test]
async fn blocked_role_carries_to_children() {
    let app = TestApp::spawn(people(), boards()).await;

    assert_eq!(role_of(&app, STRANGER_ACCOUNT, 30, 2).await["role"], "blocked");
}

#[tokio::test]
async fn unrelated_profile_has_no_role_and_no_cache_entry() {
    let app = TestApp::spawn(people(), boards()).await;

    assert_eq!(role_of(&app, STRANGER_ACCOUNT, 30, 3).await["role"], "none");
    assert!(app.cached_permissions(30).await.is_none());
}

#[tokio::test]
async fn unknown_and_malformed_boards() {
    let app = TestApp::spawn(people(), boards()).await;
    let token = app.token_for(OWNER_ACCOUNT);

    let response = app
        .get_as(&format!("/boards/{}/role", board_id(99)), &token, 9)
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.get_as("/boards/not-hex/role", &token, 9).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_BOARD_ID");
}

#[tokio::test]
async fn permission_check_allows_matching_roles() {
    let app = TestApp::spawn(people(), boards()).await;
    let token = app.token_for(OWNER_ACCOUNT);
    let path = format!("/boards/{}/permissions/check", board_id(2));

    let response = app
        .post_as(&path, &token, 9, json!({"roles": ["owner", "admin"]}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], true);
    assert_eq!(body["role"], "admin");

    let response = app
        .post_as(&path, &token, 9, json!({"roles": ["owner"]}))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn permission_check_disallow_inverts_match() {
    let app = TestApp::spawn(people(), boards()).await;
    let token = app.token_for(STRANGER_ACCOUNT);
    let path = format!("/boards/{}/permissions/check", board_id(1));

    let response = app
        .post_as(
            &path,
            &token,
            30,
            json!({"roles": ["blocked"], "disallow": true}),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["role"], "blocked");

    let token = app.token_for(MEMBER_ACCOUNT);
    let response = app
        .post_as(
            &path,
            &token,
            21,
            json!({"roles": ["blocked"], "disallow": true}),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn permission_check_treats_guest_as_viewer() {
    let app = TestApp::spawn(people(), boards()).await;
    let token = app.token_for(MEMBER_ACCOUNT);

    let response = app
        .post_as(
            &format!("/boards/{}/permissions/check", board_id(1)),
            &token,
            21,
            json!({"roles": ["viewer"]}),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], true);
    assert_eq!(body["role"], "viewer");
}

#[tokio::test]
async fn permission_check_requires_roles() {
    let app = TestApp::spawn(people(), boards()).await;
    let token = app.token_for(OWNER_ACCOUNT);

    let response = app
        .post_as(
            &format!("/boards/{}/permissions/check", board_id(1)),
            &token,
            9,
            json!({"roles": []}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn board_routes_require_authentication() {
    let app = TestApp::spawn(people(), boards()).await;

    let response = app
        .get_public(&format!("/boards/{}/role", board_id(1)))
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn membership_changes_show_up_in_resolved_roles() {
    let app = TestApp::spawn(people(), boards()).await;

    app.state
        .membership
        .change_role(ProfileId(9), board_id(1), ProfileId(21), Role::Admin)
        .await
        .unwrap();
    assert_eq!(role_of(&app, MEMBER_ACCOUNT, 21, 1).await["role"], "admin");

    app.state
        .membership
        .block(ProfileId(9), board_id(1), &[ProfileId(21)])
        .await
        .unwrap();
    assert_eq!(role_of(&app, MEMBER_ACCOUNT, 21, 1).await["role"], "blocked");
}
