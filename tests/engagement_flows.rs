// tests/engagement_flows.rs

mod common;

use erp_domain_store::{
    AppError, Money,
    common::ids::SequentialIds,
    db::MemoryStorage,
    models::{
        catalog::{OptionDraft, ServiceDraft},
        engagement::{
            EngagementDraft, EngagementKind, EngagementLine, EngagementPatch, EngagementStatus, OptionOverride,
            OptionOverrides,
        },
    },
};

use common::{harness, harness_with, noon};

fn option(label: &str, price: i64, minutes: u32) -> OptionDraft {
    OptionDraft {
        label: label.into(),
        default_duration_min: minutes,
        unit_price_ht: Money::from_units(price),
        active: true,
        ..OptionDraft::default()
    }
}

fn invoices(store: &erp_domain_store::DomainStore) -> usize {
    store
        .engagements()
        .list()
        .iter()
        .filter(|e| e.kind == EngagementKind::Invoice)
        .count()
}

#[tokio::test]
async fn completing_a_service_invoices_it_once() {
    let h = harness().await;
    let store = &h.store;

    let saved = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-9".into(),
            service_id: "s-9".into(),
            scheduled_at: Some(noon()),
            status: Some(EngagementStatus::Scheduled),
            ..EngagementDraft::default()
        })
        .unwrap();
    assert!(saved.invoice.is_none());
    let id = saved.engagement.id.clone();

    let done = store
        .engagements()
        .update(&id, EngagementPatch { status: Some(EngagementStatus::Completed), ..EngagementPatch::default() })
        .unwrap()
        .unwrap();
    let (invoice, _) = done.invoice.expect("fatura gerada na transição");
    assert_eq!(invoice.kind, EngagementKind::Invoice);
    assert!(invoice.invoice_number.as_deref().is_some_and(|n| n.starts_with("FAC-20240612-")));

    // Novo salvamento ainda `réalisé`: nenhuma fatura extra
    let again = store
        .engagements()
        .update(&id, EngagementPatch { support_detail: Some("Berline".into()), ..EngagementPatch::default() })
        .unwrap()
        .unwrap();
    assert!(again.invoice.is_none());
    assert_eq!(invoices(store), 1);
}

#[tokio::test]
async fn existing_invoice_for_the_same_day_blocks_a_second_one() {
    let h = harness().await;
    let store = &h.store;

    let first = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            service_id: "s-1".into(),
            scheduled_at: Some(noon()),
            status: Some(EngagementStatus::Completed),
            ..EngagementDraft::default()
        })
        .unwrap();
    assert!(first.invoice.is_some());

    let second = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            service_id: "s-1".into(),
            scheduled_at: Some(noon() + chrono::Duration::hours(3)),
            status: Some(EngagementStatus::Scheduled),
            ..EngagementDraft::default()
        })
        .unwrap();
    let completed = store
        .engagements()
        .update(
            &second.engagement.id,
            EngagementPatch { status: Some(EngagementStatus::Completed), ..EngagementPatch::default() },
        )
        .unwrap()
        .unwrap();

    assert!(completed.invoice.is_none());
    assert_eq!(invoices(store), 1);
}

#[tokio::test]
async fn exhausted_invoice_numbers_abort_before_any_mutation() {
    // Todos os sorteios caem no mesmo sufixo
    let h = harness_with(MemoryStorage::new(), SequentialIds::with_invoice_suffixes(vec![7])).await;
    let store = &h.store;

    store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            service_id: "s-1".into(),
            scheduled_at: Some(noon()),
            status: Some(EngagementStatus::Completed),
            ..EngagementDraft::default()
        })
        .unwrap();
    let before = store.engagements().list().len();

    let result = store.engagements().add(EngagementDraft {
        client_id: "c-2".into(),
        service_id: "s-2".into(),
        scheduled_at: Some(noon()),
        status: Some(EngagementStatus::Completed),
        ..EngagementDraft::default()
    });

    assert!(matches!(result, Err(AppError::InvoiceNumberExhausted(20))));
    assert_eq!(store.engagements().list().len(), before);
}

#[tokio::test]
async fn option_price_and_surcharge_add_up() {
    let h = harness().await;
    let store = &h.store;

    let (service, _) = store
        .catalog()
        .add(ServiceDraft {
            category: "Lavage".into(),
            name: "Intérieur".into(),
            options: vec![option("Aspiration", 50, 30)],
            active: true,
            ..ServiceDraft::default()
        })
        .unwrap();
    let saved = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            service_id: service.id.clone(),
            option_ids: vec![service.options[0].id.clone()],
            additional_charge: Some(Money::from_units(10)),
            ..EngagementDraft::default()
        })
        .unwrap();

    let totals = store.engagements().totals(&saved.engagement);
    assert_eq!(totals.price, Money::from_units(50));
    assert_eq!(totals.duration, 30);
    assert_eq!(totals.surcharge, Money::from_units(10));
    // Cálculo puro: repetir não muda nada
    assert_eq!(store.engagements().totals(&saved.engagement), totals);
}

#[tokio::test]
async fn multi_line_base_values_scale_with_quantity() {
    let h = harness().await;
    let store = &h.store;

    let (service, _) = store
        .catalog()
        .add(ServiceDraft {
            category: "Lavage".into(),
            name: "Forfait".into(),
            base_price: Some(Money::from_units(20)),
            base_duration: Some(15),
            active: true,
            ..ServiceDraft::default()
        })
        .unwrap();
    let saved = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            services: vec![EngagementLine { service_id: service.id.clone(), quantity: Some(3), ..EngagementLine::default() }],
            ..EngagementDraft::default()
        })
        .unwrap();

    let totals = store.engagements().totals(&saved.engagement);
    assert_eq!(totals.price, Money::from_units(60));
    assert_eq!(totals.duration, 45);
}

fn line_with_stray_override() -> EngagementLine {
    let mut overrides = OptionOverrides::new();
    overrides.insert("o1".into(), OptionOverride { quantity: Some(0), ..OptionOverride::default() });
    overrides.insert("ghost".into(), OptionOverride::default());
    EngagementLine {
        service_id: "s-1".into(),
        option_ids: vec!["o1".into()],
        option_overrides: overrides,
        quantity: Some(0),
        ..EngagementLine::default()
    }
}

#[tokio::test]
async fn line_overrides_stay_within_the_selected_options() {
    let h = harness().await;
    let store = &h.store;

    let saved = store
        .engagements()
        .add(EngagementDraft {
            client_id: "c-1".into(),
            services: vec![line_with_stray_override()],
            ..EngagementDraft::default()
        })
        .unwrap();
    let stored = store.engagements().get(&saved.engagement.id).unwrap();
    let line = &stored.services[0];
    assert_eq!(line.option_overrides.keys().collect::<Vec<_>>(), vec!["o1"]);
    assert_eq!(line.option_overrides["o1"].quantity, Some(1));
    assert_eq!(line.quantity, Some(1));

    // Mesmo contrato na atualização
    store
        .engagements()
        .update(
            &saved.engagement.id,
            EngagementPatch { services: Some(vec![line_with_stray_override()]), ..EngagementPatch::default() },
        )
        .unwrap()
        .unwrap();
    let stored = store.engagements().get(&saved.engagement.id).unwrap();
    for line in &stored.services {
        assert!(line.option_overrides.keys().all(|k| line.option_ids.contains(k)));
    }
}
