//! Tests for the company service.

use rstest::rstest;
use uuid::Uuid;

use super::*;
use crate::domain::ports::MockEntityStore;
use crate::domain::record::merge_rows;
use crate::domain::{Actor, ErrorCode, UserId};
use crate::test_support::{company_row, contact_row, handle_with};

#[rstest]
#[tokio::test]
async fn client_sees_only_own_active_company() {
    let company = CompanyId::random();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .withf(move |query| {
            query.table == Table::ClientCompanies
                && query.filters.contains(&Filter::eq("id", Value::from(company)))
                && query.filters.contains(&Filter::eq("is_active", true))
        })
        .times(1)
        .return_once(move |_| Ok(vec![company_row(company, "Northwind Builders")]));

    let actor = Actor::client(UserId::random(), Some(company));
    let mut service = CompanyService::new(handle_with(store, actor));
    let companies = service.list().await.expect("list succeeds");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies.first().map(|c| c.id), Some(company));
}

#[rstest]
#[tokio::test]
async fn staff_list_is_sorted_by_name() {
    let rows = vec![
        company_row(CompanyId::random(), "zephyr homes"),
        company_row(CompanyId::random(), "Acme Renovations"),
        company_row(CompanyId::random(), "maple & Co"),
    ];
    let mut store = MockEntityStore::new();
    store.expect_select().times(1).return_once(move |_| Ok(rows));

    let mut service = CompanyService::new(handle_with(store, Actor::admin(UserId::random())));
    let names: Vec<_> = service
        .list()
        .await
        .expect("list succeeds")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Acme Renovations", "maple & Co", "zephyr homes"]);
}

#[rstest]
#[tokio::test]
async fn clients_cannot_register_companies() {
    let mut store = MockEntityStore::new();
    store.expect_insert().times(0);

    let actor = Actor::client(UserId::random(), Some(CompanyId::random()));
    let mut service = CompanyService::new(handle_with(store, actor));
    let err = service
        .create(NewCompany::named("Shadow Corp"))
        .await
        .expect_err("clients cannot create");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn other_company_reads_as_not_found() {
    let other = CompanyId::random();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .return_once(move |_| Ok(vec![company_row(other, "Elsewhere Ltd")]));

    let actor = Actor::client(UserId::random(), Some(CompanyId::random()));
    let service = CompanyService::new(handle_with(store, actor));
    let err = service
        .get_with_contacts(other)
        .await
        .expect_err("hidden company");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn get_with_contacts_lists_primary_first() {
    let company = CompanyId::random();
    let primary = Uuid::new_v4();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .withf(|query| query.table == Table::ClientCompanies)
        .times(1)
        .return_once(move |_| Ok(vec![company_row(company, "Northwind Builders")]));
    store
        .expect_select()
        .withf(move |query| {
            query.table == Table::ClientContacts
                && query.filters.contains(&Filter::eq("company_id", Value::from(company)))
                && query.filters.contains(&Filter::eq("is_active", true))
        })
        .times(1)
        .return_once(move |_| {
            Ok(vec![
                contact_row(Uuid::new_v4(), company, "Adams", false),
                contact_row(primary, company, "Zimmer", true),
            ])
        });

    let service = CompanyService::new(handle_with(store, Actor::coordinator(UserId::random())));
    let view = service.get_with_contacts(company).await.expect("visible");
    assert_eq!(view.company.name, "Northwind Builders");
    assert_eq!(view.contacts.len(), 2);
    assert_eq!(
        view.primary_contact().map(|c| *c.id.as_uuid()),
        Some(primary)
    );
    assert_eq!(view.contacts.first().map(|c| c.last_name.as_str()), Some("Zimmer"));
}

#[rstest]
#[tokio::test]
async fn archive_marks_company_inactive() {
    let company = CompanyId::random();
    let mut store = MockEntityStore::new();
    store
        .expect_select()
        .times(1)
        .return_once(move |_| Ok(vec![company_row(company, "Northwind Builders")]));
    store
        .expect_update()
        .withf(|table, _, patch| {
            *table == Table::ClientCompanies && patch.get("is_active") == Some(&json!(false))
        })
        .times(1)
        .return_once(move |_, _, patch| {
            let mut row = company_row(company, "Northwind Builders");
            merge_rows(&mut row, patch);
            Ok(vec![row])
        });

    let mut service = CompanyService::new(handle_with(store, Actor::coordinator(UserId::random())));
    let archived = service.archive(company).await.expect("archived");
    assert!(!archived.is_active);
}
