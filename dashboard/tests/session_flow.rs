//! Sign-in, actor resolution and session-bound services.

use std::sync::Arc;

use dashboard::domain::live::{ReconcilerState, SyncOutcome};
use dashboard::domain::ports::{AuthUser, Credentials, Table};
use dashboard::domain::services::ProjectListOptions;
use dashboard::domain::{DashboardSession, ErrorCode, Role, UserId};
use rstest::rstest;
use serde_json::json;

mod support;

use support::{StaticAuth, World};

fn credentials(password: &str) -> Credentials {
    Credentials {
        email: "robin@harbour.test".to_owned(),
        password: password.to_owned(),
    }
}

fn auth_user(id: UserId) -> AuthUser {
    AuthUser {
        id,
        email: Some("robin@harbour.test".to_owned()),
    }
}

#[rstest]
#[tokio::test]
async fn first_sign_in_provisions_an_affiliated_client() {
    let world = World::new();
    let user = UserId::random();
    world.add_contact(world.co2, "Chen", true, Some(user));
    let auth = Arc::new(StaticAuth::accepting(auth_user(user), "s3cret"));

    let session = DashboardSession::sign_in(world.ports_with_auth(auth), &credentials("s3cret"))
        .await
        .expect("sign-in succeeds");

    assert_eq!(session.profile().role.as_deref(), Some("client"));
    assert_eq!(session.actor().role(), Some(Role::Client));
    assert_eq!(session.actor().affiliated_company_id(), Some(world.co2));
    let profiles = world.store.rows(Table::Profiles);
    assert_eq!(profiles.len(), 1);
    assert_eq!(
        profiles.first().and_then(|row| row.get("email")),
        Some(&json!("robin@harbour.test"))
    );

    let mut projects = session.projects();
    let listed = projects
        .list(ProjectListOptions::default())
        .await
        .expect("projects list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed.first().map(|p| p.id), Some(world.co2_project));
}

#[rstest]
#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let world = World::new();
    let auth = Arc::new(StaticAuth::accepting(auth_user(UserId::random()), "s3cret"));

    let err = DashboardSession::sign_in(world.ports_with_auth(auth), &credentials("guess"))
        .await
        .err()
        .expect("sign-in refused");
    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert!(world.store.rows(Table::Profiles).is_empty());
}

#[rstest]
#[tokio::test]
async fn blank_credentials_never_reach_the_auth_service() {
    let world = World::new();
    let err = DashboardSession::sign_in(world.ports(), &credentials(""))
        .await
        .err()
        .expect("blank password refused");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn restore_without_a_session_returns_none() {
    let world = World::new();
    let restored = DashboardSession::restore(world.ports())
        .await
        .expect("restore succeeds");
    assert!(restored.is_none());
}

#[rstest]
#[tokio::test]
async fn clients_without_affiliation_see_nothing() {
    let world = World::new();
    let user = UserId::random();
    let auth = Arc::new(StaticAuth::accepting(auth_user(user), "s3cret"));

    let session = DashboardSession::restore(world.ports_with_auth(auth))
        .await
        .expect("restore succeeds")
        .expect("session exists");
    assert_eq!(session.actor().affiliated_company_id(), None);

    let mut projects = session.projects();
    let listed = projects
        .list(ProjectListOptions::default())
        .await
        .expect("deny-all scope still opens");
    assert!(listed.is_empty());
}

#[rstest]
#[tokio::test]
async fn admins_promote_coordinators() {
    let world = World::new();
    let admin = UserId::random();
    world.store.seed(
        Table::Profiles,
        [support::row(json!({
            "id": admin.to_string(),
            "role": "admin",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))],
    );
    let target = UserId::random();
    world.store.seed(
        Table::Profiles,
        [support::row(json!({
            "id": target.to_string(),
            "role": "client",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))],
    );
    let auth = Arc::new(StaticAuth::accepting(auth_user(admin), "s3cret"));
    let session = DashboardSession::sign_in(world.ports_with_auth(auth), &credentials("s3cret"))
        .await
        .expect("sign-in succeeds");

    let promoted = session
        .profiles()
        .set_role(target, Role::Coordinator)
        .await
        .expect("role changes");
    assert_eq!(promoted.role.as_deref(), Some("coordinator"));
    session.sign_out().await.expect("sign-out succeeds");
}

#[rstest]
#[tokio::test]
async fn signing_out_closes_live_collections() {
    let world = World::new();
    let user = UserId::random();
    world.add_contact(world.co1, "Okafor", true, Some(user));
    let auth = Arc::new(StaticAuth::accepting(auth_user(user), "s3cret"));
    let session = DashboardSession::sign_in(world.ports_with_auth(auth), &credentials("s3cret"))
        .await
        .expect("sign-in succeeds");

    let mut projects = session.projects();
    let mut comments = session.comments();
    projects
        .list(ProjectListOptions::default())
        .await
        .expect("projects list");
    comments
        .list(world.co1_projects[0])
        .await
        .expect("comments list");
    assert_eq!(world.store.subscriber_count(), 2);

    let (outcome, signed_out) = tokio::join!(projects.next_change(), session.sign_out());
    signed_out.expect("sign-out succeeds");
    assert_eq!(outcome.expect("no I/O"), SyncOutcome::Closed);
    assert_eq!(projects.live().state(), ReconcilerState::Closed);

    assert_eq!(comments.sync().await.expect("no I/O"), 0);
    assert_eq!(comments.live().state(), ReconcilerState::Closed);
    assert_eq!(world.store.subscriber_count(), 0);

    let err = projects
        .list(ProjectListOptions::default())
        .await
        .expect_err("session is over");
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}
