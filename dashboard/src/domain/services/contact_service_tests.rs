//! Tests for the contact service.

use mockall::Sequence;
use rstest::rstest;

use super::*;
use crate::domain::ports::MockEntityStore;
use crate::domain::record::merge_rows;
use crate::domain::{Actor, ErrorCode};
use crate::test_support::{contact_row, handle_with};

#[rstest]
#[tokio::test]
async fn set_primary_unsets_siblings_before_promoting() {
    let company = CompanyId::random();
    let target = Uuid::new_v4();
    let previous = Uuid::new_v4();
    let mut seq = Sequence::new();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(move |_| Ok(vec![contact_row(target, company, "Baker", false)]));
    store
        .expect_update()
        .withf(move |table, filters, patch| {
            *table == Table::ClientContacts
                && filters.contains(&Filter::eq("company_id", Value::from(company)))
                && filters.contains(&Filter::eq("is_primary", true))
                && filters.contains(&Filter::neq("id", Value::String(target.to_string())))
                && patch.get("is_primary") == Some(&json!(false))
        })
        .times(1)
        .in_sequence(&mut seq)
        .return_once(move |_, _, patch| {
            let mut row = contact_row(previous, company, "Abel", true);
            merge_rows(&mut row, patch);
            Ok(vec![row])
        });
    store
        .expect_update()
        .withf(move |_, filters, patch| {
            filters == &[Filter::eq("id", Value::String(target.to_string()))]
                && patch.get("is_primary") == Some(&json!(true))
        })
        .times(1)
        .in_sequence(&mut seq)
        .return_once(move |_, _, patch| {
            let mut row = contact_row(target, company, "Baker", false);
            merge_rows(&mut row, patch);
            Ok(vec![row])
        });

    let mut service = ContactService::new(handle_with(store, Actor::coordinator(UserId::random())));
    let contact = service
        .set_primary(ContactId::from_uuid(target))
        .await
        .expect("primary set");
    assert!(contact.is_primary);
}

#[rstest]
#[tokio::test]
async fn set_primary_tolerates_no_previous_primary() {
    let company = CompanyId::random();
    let target = Uuid::new_v4();
    let mut seq = Sequence::new();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .return_once(move |_| Ok(vec![contact_row(target, company, "Baker", false)]));
    store
        .expect_update()
        .withf(|_, _, patch| patch.get("is_primary") == Some(&json!(false)))
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Ok(Vec::new()));
    store
        .expect_update()
        .withf(|_, _, patch| patch.get("is_primary") == Some(&json!(true)))
        .times(1)
        .in_sequence(&mut seq)
        .return_once(move |_, _, patch| {
            let mut row = contact_row(target, company, "Baker", false);
            merge_rows(&mut row, patch);
            Ok(vec![row])
        });

    let mut service = ContactService::new(handle_with(store, Actor::admin(UserId::random())));
    let contact = service
        .set_primary(ContactId::from_uuid(target))
        .await
        .expect("primary set");
    assert!(contact.is_primary);
}

#[rstest]
#[tokio::test]
async fn client_cannot_touch_other_companies_contacts() {
    let target = Uuid::new_v4();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .return_once(move |_| Ok(vec![contact_row(target, CompanyId::random(), "Baker", true)]));
    store.expect_update().times(0);

    let actor = Actor::client(UserId::random(), Some(CompanyId::random()));
    let mut service = ContactService::new(handle_with(store, actor));
    let err = service
        .set_primary(ContactId::from_uuid(target))
        .await
        .expect_err("outside scope");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn linking_profiles_is_staff_only() {
    let mut store = MockEntityStore::new();
    store.expect_select().times(0);
    store.expect_update().times(0);

    let company = CompanyId::random();
    let actor = Actor::client(UserId::random(), Some(company));
    let mut service = ContactService::new(handle_with(store, actor));
    let err = service
        .link_to_profile(ContactId::random(), UserId::random())
        .await
        .expect_err("clients cannot link");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn create_validates_email_before_io() {
    let mut store = MockEntityStore::new();
    store.expect_insert().times(0);
    let mut input = NewContact::new(CompanyId::random(), "Ada", "Lovelace");
    input.email = Some("not-an-email".into());

    let mut service = ContactService::new(handle_with(store, Actor::coordinator(UserId::random())));
    let err = service.create(input).await.expect_err("bad email");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn archive_clears_primary_flag() {
    let company = CompanyId::random();
    let target = Uuid::new_v4();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .return_once(move |_| Ok(vec![contact_row(target, company, "Baker", true)]));
    store
        .expect_update()
        .withf(|_, _, patch| {
            patch.get("is_active") == Some(&json!(false))
                && patch.get("is_primary") == Some(&json!(false))
        })
        .times(1)
        .return_once(move |_, _, patch| {
            let mut row = contact_row(target, company, "Baker", true);
            merge_rows(&mut row, patch);
            Ok(vec![row])
        });

    let actor = Actor::client(UserId::random(), Some(company));
    let mut service = ContactService::new(handle_with(store, actor));
    let contact = service
        .archive(ContactId::from_uuid(target))
        .await
        .expect("archived");
    assert!(!contact.is_active);
    assert!(!contact.is_primary);
}
