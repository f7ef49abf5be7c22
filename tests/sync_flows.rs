// tests/sync_flows.rs

mod common;

use std::time::Duration;

use chrono::NaiveDate;
use erp_domain_store::{
    AppError, Money,
    middleware::rbac::{PermClientArchive, PermLeadEdit},
    models::{
        client::{ClientDraft, ContactDraft, ContactRole},
        engagement::EngagementDraft,
        lead::LeadDraft,
        purchase::{PurchaseCategory, PurchaseDraft, PurchasePatch, PurchaseStatus},
        settings::{BackendUserSnapshot, SessionPayload},
    },
    services::sync::OpState,
};
use rust_decimal::Decimal;

use common::{company, harness, session};

fn lead(company: &str, email: &str, phone: &str) -> LeadDraft {
    LeadDraft {
        company: company.into(),
        contact: "Ana".into(),
        phone: phone.into(),
        email: Some(email.into()),
        source: "Salon".into(),
        ..LeadDraft::default()
    }
}

#[tokio::test]
async fn failed_create_is_queued_and_retried() {
    let h = harness().await;
    h.backend.fail_next(1);

    let (created, ticket) = h.store.leads().add(lead("Acme", "ana@acme.fr", "06 11 22 33 44")).unwrap();
    let op_id = ticket.op_id().expect("operação registrada");
    assert!(ticket.settled().await.is_failed());

    // Sem rollback: o lead continua visível localmente
    assert!(h.store.leads().get(&created.id).is_some());
    let failed = h.store.failed_operations();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].entity_id, created.id);
    assert!(h.store.last_sync_error().is_some_and(|e| e.contains("500")));

    let retried = h.store.retry(op_id).unwrap();
    assert_eq!(retried.settled().await, OpState::Confirmed);
    assert!(h.store.failed_operations().is_empty());

    // Reconciliado com o id do servidor, na mesma posição
    let leads = h.store.leads().list();
    assert_eq!(leads.len(), 1);
    assert!(leads[0].id.starts_with("srv-"));
    assert_eq!(h.store.pending_operation(op_id).unwrap().attempts, 2);
    assert_eq!(h.backend.calls("leads.create"), 2);
}

#[tokio::test]
async fn retrying_a_healthy_operation_is_refused() {
    let h = harness().await;
    let (_, ticket) = h.store.leads().add(lead("Acme", "ana@acme.fr", "0611")).unwrap();
    let op_id = ticket.op_id().unwrap();
    assert_eq!(ticket.settled().await, OpState::Confirmed);

    assert!(matches!(h.store.retry(op_id), Err(AppError::OperationNotFailed(_))));
}

#[tokio::test]
async fn duplicate_lead_email_is_rejected_before_mutation() {
    let h = harness().await;
    h.store.leads().add(lead("Acme", "ana@acme.fr", "0611223344")).unwrap();

    let result = h.store.leads().add(lead("Autre", "ANA@Acme.FR", "0700000000"));
    assert!(matches!(result, Err(AppError::DuplicateLeadEmail)));

    let result = h.store.leads().add(lead("Autre", "bob@autre.fr", "06.11.22.33.44"));
    assert!(matches!(result, Err(AppError::DuplicateLeadPhone)));

    assert_eq!(h.store.leads().list().len(), 1);
    assert_eq!(h.backend.calls("leads.create"), 0);
}

#[tokio::test]
async fn access_requires_an_active_user_and_honours_the_wildcard() {
    let h = harness().await;
    let access = h.store.access();

    assert!(!access.has_page_access("clients"));
    assert!(matches!(access.require_permission::<PermLeadEdit>(), Err(AppError::NotAuthenticated)));

    h.store.auth().login("admin", "admin").await.unwrap();
    assert!(access.has_page_access("stats"));
    assert!(access.has_permission("settings.users"));
    assert!(access.require_permission::<PermClientArchive>().is_ok());

    // Agente sem páginas nem permissões
    h.store
        .session()
        .hydrate(SessionPayload {
            user: BackendUserSnapshot { id: "u-7".into(), username: "lecture".into(), ..BackendUserSnapshot::default() },
            ..SessionPayload::default()
        })
        .await;
    assert!(!access.has_page_access("clients"));
    assert!(matches!(access.require_permission::<PermLeadEdit>(), Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn purchase_ttc_is_recomputed_from_ht_and_rate() {
    let h = harness().await;
    let purchases = h.store.purchases();

    let purchase = purchases.add(PurchaseDraft {
        company_id: None,
        vendor: "Total".into(),
        reference: "F-001".into(),
        description: None,
        date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        amount_ht: Money::from_cents(1005),
        vat_rate: Decimal::new(55, 1),
        category: PurchaseCategory::Fuel,
        status: PurchaseStatus::Draft,
        recurring: false,
        notes: None,
        vehicle_id: None,
        kilometers: Some(120),
    });
    assert_eq!(purchase.amount_ttc, Money::from_cents(1060));

    let updated = purchases
        .update(&purchase.id, PurchasePatch { vat_rate: Some(Decimal::from(20)), ..PurchasePatch::default() })
        .unwrap();
    assert_eq!(updated.amount_ttc, Money::from_cents(1206));

    assert_eq!(purchases.bulk_remove(&[purchase.id.clone(), "pur-x".into()]), 1);
    assert!(purchases.list().is_empty());
}

#[tokio::test]
async fn deleting_a_record_the_server_never_saw_is_confirmed() {
    let h = harness().await;
    h.backend.fail_next(1);
    let (created, ticket) = h.store.leads().add(lead("Acme", "ana@acme.fr", "0611")).unwrap();
    assert!(ticket.settled().await.is_failed());

    // O servidor responde 404: para uma remoção, é sucesso
    let removal = h.store.leads().remove(&created.id).unwrap();
    assert_eq!(removal.settled().await, OpState::Confirmed);
    assert_eq!(h.backend.calls("leads.delete"), 1);
    assert!(h.store.leads().get(&created.id).is_none());
}

#[tokio::test]
async fn late_response_from_the_previous_company_is_dropped() {
    let h = harness().await;
    h.store
        .session()
        .hydrate(session(company("co-1", true), vec![company("co-2", true)]))
        .await;
    h.backend.set_latency(Duration::from_millis(20));

    let (_, ticket) = h
        .store
        .clients()
        .add(ClientDraft { name: "Garage du Parc".into(), ..ClientDraft::default() })
        .unwrap();
    h.store.session().set_active_company(Some("co-2".into()));

    // O servidor aceitou a criação, mas a resposta chega sob outra empresa
    assert_eq!(ticket.settled().await, OpState::Confirmed);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.store.clients().list().is_empty());
    // Só o recarregamento da troca consulta a lista; o da criação foi descartado
    assert_eq!(h.backend.calls("clients.get_all"), 1);
    assert_eq!(h.backend.client_table.rows().len(), 1);
}

#[tokio::test]
async fn refetch_keeps_local_creates_not_yet_on_the_server() {
    let h = harness().await;
    h.backend.fail_next(1);
    let (pending, ticket) = h
        .store
        .clients()
        .add(ClientDraft { name: "Atelier Nord".into(), ..ClientDraft::default() })
        .unwrap();
    assert!(ticket.settled().await.is_failed());

    // Criação confirmada: a coleção é recarregada do servidor
    let (_, ticket) = h
        .store
        .clients()
        .add(ClientDraft { name: "Garage du Parc".into(), ..ClientDraft::default() })
        .unwrap();
    assert_eq!(ticket.settled().await, OpState::Confirmed);
    assert!(h.backend.calls("clients.get_all") >= 1);

    let names: Vec<_> = h.store.clients().list().into_iter().map(|c| (c.id, c.name)).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&(pending.id.clone(), "Atelier Nord".to_string())));
    assert!(names.iter().any(|(id, name)| id.starts_with("srv-") && name == "Garage du Parc"));
}

#[tokio::test]
async fn archiving_a_contact_detaches_it_and_moves_the_billing_default() {
    let h = harness().await;
    let clients = h.store.clients();
    let contact = |first: &str, email: &str, billing: bool| ContactDraft {
        first_name: first.into(),
        last_name: "Martin".into(),
        email: email.into(),
        mobile: "0611223344".into(),
        roles: vec![ContactRole::Billing],
        is_billing_default: Some(billing),
    };

    let (client, _) = clients
        .add(ClientDraft { name: "Garage du Parc".into(), ..ClientDraft::default() })
        .unwrap();
    let paul = clients.add_contact(&client.id, contact("Paul", "paul@parc.fr", true)).unwrap().unwrap();
    let lea = clients.add_contact(&client.id, contact("Léa", "lea@parc.fr", false)).unwrap().unwrap();
    assert!(paul.is_billing_default);
    assert!(!lea.is_billing_default);

    let saved = h
        .store
        .engagements()
        .add(EngagementDraft {
            client_id: client.id.clone(),
            service_id: "s-1".into(),
            contact_ids: vec![paul.id.clone(), lea.id.clone()],
            ..EngagementDraft::default()
        })
        .unwrap();

    assert!(clients.archive_contact(&client.id, &paul.id));

    let stored = clients.get(&client.id).unwrap();
    let defaults: Vec<_> = stored.contacts.iter().filter(|c| c.is_billing_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, lea.id);
    assert!(stored.contacts.iter().all(|c| c.active || !c.is_billing_default));

    let engagement = h.store.engagements().get(&saved.engagement.id).unwrap();
    assert_eq!(engagement.contact_ids, vec![lea.id.clone()]);
}
