//! Tests for the project service.

use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{EntityStoreError, MockEntityStore};
use crate::domain::{Actor, ErrorCode, UserId};
use crate::test_support::{handle_with, project_row};

fn client(company: CompanyId) -> Actor {
    Actor::client(UserId::random(), Some(company))
}

#[rstest]
#[tokio::test]
async fn client_list_is_scoped_to_affiliation() {
    let company = CompanyId::random();
    let rows = vec![
        project_row(ProjectId::random(), company, "2024-05-01"),
        project_row(ProjectId::random(), company, "2024-05-20"),
    ];
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .withf(move |query| {
            query.table == Table::Projects
                && query.filters == vec![Filter::eq("client_company_id", Value::from(company))]
        })
        .times(1)
        .return_once(move |_| Ok(rows));

    let mut service = ProjectService::new(handle_with(store, client(company)));
    let projects = service
        .list(ProjectListOptions::default())
        .await
        .expect("list succeeds");

    let dates: Vec<_> = projects
        .iter()
        .filter_map(|p| p.last_update_date.map(|d| d.to_string()))
        .collect();
    assert_eq!(dates, ["2024-05-20", "2024-05-01"]);
}

#[rstest]
#[tokio::test]
async fn only_active_excludes_complete() {
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .withf(|query| query.filters.contains(&Filter::neq("status", "Complete")))
        .times(1)
        .returning(|_| Ok(Vec::new()));

    let mut service = ProjectService::new(handle_with(store, Actor::coordinator(UserId::random())));
    service
        .list(ProjectListOptions {
            company_id: None,
            only_active: true,
        })
        .await
        .expect("list succeeds");
}

#[rstest]
#[tokio::test]
async fn unrecognised_role_lists_nothing() {
    let mut store = MockEntityStore::new();
    store.expect_select().times(0);
    let actor = Actor::from_claim(UserId::random(), Some("contractor".into()), None);

    let mut service = ProjectService::new(handle_with(store, actor));
    let err = service
        .list(ProjectListOptions::default())
        .await
        .expect_err("role is unknown");

    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert!(service.live().records().is_empty());
    assert_eq!(service.live().error().map(Error::code), Some(ErrorCode::Forbidden));
}

#[rstest]
#[tokio::test]
async fn create_validates_before_io() {
    let mut store = MockEntityStore::new();
    store.expect_insert().times(0);
    let mut service = ProjectService::new(handle_with(store, Actor::coordinator(UserId::random())));

    let err = service
        .create(NewProject::new(" ", "1 Main St", CompanyId::random()))
        .await
        .expect_err("blank name");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn client_cannot_create_for_another_company() {
    let mut store = MockEntityStore::new();
    store.expect_insert().times(0);
    let mut service = ProjectService::new(handle_with(store, client(CompanyId::random())));

    let err = service
        .create(NewProject::new("Garage", "9 Oak Ave", CompanyId::random()))
        .await
        .expect_err("outside scope");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn create_stamps_update_date_and_creator() {
    let actor = Actor::coordinator(UserId::random());
    let creator = actor.id().to_string();
    let company = CompanyId::random();
    let mut store = MockEntityStore::new();
    store
        .expect_insert()
        .withf(move |table, row| {
            *table == Table::Projects
                && row.get("last_update_date") == Some(&json!("2024-06-03"))
                && row.get("created_by") == Some(&json!(creator))
        })
        .times(1)
        .returning(move |_, mut row| {
            row.insert("id".into(), Value::from(ProjectId::random()));
            row.insert("created_at".into(), json!("2024-06-03T14:00:00Z"));
            row.insert("updated_at".into(), json!("2024-06-03T14:00:00Z"));
            Ok(row)
        });

    let mut service = ProjectService::new(handle_with(store, actor));
    let project = service
        .create(NewProject::new("Garage", "9 Oak Ave", company))
        .await
        .expect("create succeeds");
    assert_eq!(project.client_company_id, company);
}

#[rstest]
#[tokio::test]
async fn create_failure_is_a_backend_error() {
    let mut store = MockEntityStore::new();
    store
        .expect_insert()
        .times(1)
        .return_once(|_, _| Err(EntityStoreError::connection("timed out")));
    let mut service = ProjectService::new(handle_with(store, Actor::admin(UserId::random())));

    let err = service
        .create(NewProject::new("Garage", "9 Oak Ave", CompanyId::random()))
        .await
        .expect_err("store down");
    assert_eq!(err.code(), ErrorCode::Backend);
    assert!(err.is_transient());
    assert!(service.live().records().is_empty());
}

#[rstest]
#[tokio::test]
async fn update_outside_scope_is_forbidden() {
    let id = ProjectId::random();
    let existing = project_row(id, CompanyId::random(), "2024-05-01");
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(move |_| Ok(vec![existing]));
    store.expect_update().times(0);

    let mut service = ProjectService::new(handle_with(store, client(CompanyId::random())));
    let err = service
        .update_status(id, ProjectStatus::Drywall, None)
        .await
        .expect_err("not theirs");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn update_of_missing_project_is_not_found() {
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(|_| Ok(Vec::new()));
    store.expect_update().times(0);

    let mut service = ProjectService::new(handle_with(store, Actor::admin(UserId::random())));
    let patch = ProjectPatch {
        name: Some("Renamed".into()),
        ..ProjectPatch::default()
    };
    let err = service
        .update(ProjectId::random(), patch)
        .await
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn update_status_sets_note_and_date() {
    let id = ProjectId::random();
    let company = CompanyId::random();
    let existing = project_row(id, company, "2024-05-01");
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(move |_| Ok(vec![existing]));
    store
        .expect_update()
        .withf(|table, _, patch| {
            *table == Table::Projects
                && patch.get("status") == Some(&json!("Punch List"))
                && patch.get("last_update") == Some(&json!("Walkthrough Friday"))
                && patch.get("last_update_date") == Some(&json!("2024-06-03"))
        })
        .times(1)
        .return_once(move |_, _, patch| {
            let mut row = project_row(id, company, "2024-06-03");
            crate::domain::record::merge_rows(&mut row, patch);
            Ok(vec![row])
        });

    let mut service = ProjectService::new(handle_with(store, Actor::coordinator(UserId::random())));
    let project = service
        .update_status(id, ProjectStatus::PunchList, Some("Walkthrough Friday".into()))
        .await
        .expect("update succeeds");
    assert_eq!(project.status, ProjectStatus::PunchList);
    assert_eq!(project.last_update.as_deref(), Some("Walkthrough Friday"));
}

#[rstest]
#[tokio::test]
async fn delete_outside_scope_reports_not_found() {
    let id = ProjectId::random();
    let existing = project_row(id, CompanyId::random(), "2024-05-01");
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(move |_| Ok(vec![existing]));
    store.expect_delete().times(0);

    let mut service = ProjectService::new(handle_with(store, client(CompanyId::random())));
    let err = service.delete(id).await.expect_err("hidden");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn delete_missing_project_is_not_found() {
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(|_| Ok(Vec::new()));
    let mut service = ProjectService::new(handle_with(store, Actor::admin(UserId::random())));

    let err = service.delete(ProjectId::random()).await.expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
}
