// tests/session_flows.rs

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use erp_domain_store::{
    common::ids::SequentialIds,
    db::{
        KeyValueStorage, MemoryStorage,
        settings_repo::{ACTIVE_COMPANY_STORAGE_KEY, THEME_STORAGE_KEY, VAT_STORAGE_KEY},
    },
    models::{
        client::ClientDraft,
        company::{CompanyDraft, CompanyPatch, SignatureDraft, SignatureScope},
        settings::{Backpack, BackpackSettings, SidebarTitlePatch, ThemeMode},
    },
};
use rust_decimal::Decimal;
use serde_json::json;

use common::{company, harness, harness_with, session};

#[tokio::test]
async fn hydration_prefers_the_user_company_and_loads_its_backpack() {
    let h = harness().await;
    h.backend.set_backpack(
        "co-1",
        Backpack {
            settings: Some(BackpackSettings { vat_enabled: None, vat_rate: Some(Decimal::new(10, 2)) }),
            stats: BTreeMap::from([("revenue".to_string(), json!(1200))]),
        },
    );

    let user = h
        .store
        .session()
        .hydrate(session(company("co-1", false), vec![company("co-2", true), company("co-1", true)]))
        .await;

    let snapshot = h.store.snapshot();
    // Empresa do payload na frente, sem duplicatas
    let ids: Vec<_> = snapshot.companies.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["co-1", "co-2"]);
    assert_eq!(user.company_id.as_deref(), Some("co-1"));
    assert_eq!(snapshot.active_company_id.as_deref(), Some("co-1"));
    assert_eq!(snapshot.current_user_id.as_deref(), Some("u-1"));
    assert!(!snapshot.vat_enabled);
    assert_eq!(snapshot.vat_rate, Decimal::new(10, 2));
    assert_eq!(snapshot.stats["revenue"], json!(1200));

    assert_eq!(h.storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().as_deref(), Some("co-1"));
    assert_eq!(h.backend.company_scope().as_deref(), Some("co-1"));
    assert_eq!(h.backend.calls("backpack"), 1);
}

#[tokio::test]
async fn persisted_company_wins_over_the_payload() {
    let storage = MemoryStorage::with_entries(vec![(ACTIVE_COMPANY_STORAGE_KEY, "co-2")]);
    let h = harness_with(storage, SequentialIds::new()).await;

    h.store
        .session()
        .hydrate(session(company("co-1", true), vec![company("co-2", true)]))
        .await;
    assert_eq!(h.store.session().active_company_id().as_deref(), Some("co-2"));
}

#[tokio::test]
async fn concurrent_backpack_loads_hit_the_backend_once() {
    let h = harness().await;
    h.backend.set_latency(Duration::from_millis(20));
    let session = h.store.session();

    tokio::join!(
        session.load_company_backpack("co-1"),
        session.load_company_backpack("co-1"),
        session.load_company_backpack("co-1"),
    );
    session.load_company_backpack("co-1").await;

    assert_eq!(h.backend.calls("backpack"), 1);
}

#[tokio::test]
async fn failed_backpack_load_can_be_retried() {
    let h = harness().await;
    h.backend.fail_next(1);
    let session = h.store.session();

    session.load_company_backpack("co-1").await;
    session.load_company_backpack("co-1").await;
    session.load_company_backpack("co-1").await;

    assert_eq!(h.backend.calls("backpack"), 2);
}

#[tokio::test]
async fn switching_company_clears_before_reloading() {
    let h = harness().await;
    h.store
        .session()
        .hydrate(session(company("co-1", true), vec![company("co-2", false)]))
        .await;
    h.store
        .clients()
        .add(ClientDraft { name: "Garage du Parc".into(), ..ClientDraft::default() })
        .unwrap();
    assert_eq!(h.store.clients().list().len(), 1);
    let epoch = h.store.snapshot().company_epoch;

    h.store.session().set_active_company(Some("co-2".into()));

    // Síncrono: nada da empresa anterior sobra
    let snapshot = h.store.snapshot();
    assert!(snapshot.clients.is_empty());
    assert!(snapshot.stats.is_empty());
    assert_eq!(snapshot.active_company_id.as_deref(), Some("co-2"));
    assert_eq!(snapshot.company_epoch, epoch + 1);
    assert!(!snapshot.vat_enabled);
    assert_eq!(h.storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().as_deref(), Some("co-2"));
    assert_eq!(h.backend.company_scope().as_deref(), Some("co-2"));

    // Assíncrono: backpack e coleções da nova empresa
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.backend.calls("backpack"), 2);
    assert!(h.backend.calls("clients.get_all") >= 1);
    assert!(h.backend.calls("categories.get_all") >= 1);

    h.store.session().set_active_company(None);
    assert!(h.storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn legacy_storage_keys_are_migrated_on_startup() {
    let storage = MemoryStorage::with_entries(vec![
        ("washingo-vat-settings", r#"{"enabled":false,"rate":0.1}"#),
        ("washango-theme", "dark"),
    ]);
    let h = harness_with(storage, SequentialIds::new()).await;

    let snapshot = h.store.snapshot();
    assert!(!snapshot.vat_enabled);
    assert_eq!(snapshot.vat_rate, Decimal::new(1, 1));
    assert_eq!(snapshot.theme, ThemeMode::Dark);

    assert!(h.storage.get("washingo-vat-settings").unwrap().is_none());
    assert!(h.storage.get("washango-theme").unwrap().is_none());
    assert!(h.storage.get(VAT_STORAGE_KEY).unwrap().is_some());
    assert_eq!(h.storage.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("dark"));
}

#[tokio::test]
async fn settings_are_persisted_immediately() {
    let h = harness().await;
    h.store
        .session()
        .hydrate(session(company("co-1", true), vec![]))
        .await;
    let settings = h.store.settings();

    settings.set_vat_enabled(false);
    settings.set_vat_rate(Decimal::new(-5, 2));
    assert_eq!(settings.vat_rate(), Decimal::ZERO);
    assert!(!h.store.companies().get("co-1").unwrap().vat_enabled);

    let raw = h.storage.get(VAT_STORAGE_KEY).unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["perCompany"]["co-1"], json!(false));

    assert_eq!(settings.toggle_theme(), ThemeMode::Dark);
    assert_eq!(h.storage.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("dark"));

    let title = settings.set_sidebar_title(SidebarTitlePatch { text: Some("Atelier".into()), hidden: None });
    assert_eq!(title.text, "Atelier");
    assert!(!title.hidden);
    assert_eq!(settings.reset_sidebar_title().text, "Wash&Go");
}

#[tokio::test]
async fn company_signatures_keep_a_single_default() {
    let h = harness().await;
    h.store
        .session()
        .hydrate(session(company("co-1", true), vec![]))
        .await;
    let signatures = h.store.signatures();
    let draft = |label: &str, is_default: bool| SignatureDraft {
        scope: SignatureScope::Company,
        company_id: Some("co-1".into()),
        user_id: None,
        label: label.into(),
        html: format!("<p>{}</p>", label),
        is_default,
    };

    let first = signatures.create(draft("Standard", true));
    let second = signatures.create(draft("Relance", true));
    let defaults: Vec<_> = signatures.list().into_iter().filter(|s| s.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);
    assert_eq!(
        h.store.companies().get("co-1").unwrap().default_signature_id.as_deref(),
        Some(second.id.as_str())
    );

    // A padrão removida é substituída pela assinatura restante da empresa
    assert!(signatures.remove(&second.id));
    assert_eq!(signatures.default_for_company("co-1").map(|s| s.id), Some(first.id.clone()));

    let personal = signatures.create(SignatureDraft {
        scope: SignatureScope::User,
        company_id: None,
        user_id: Some("u-1".into()),
        label: "Perso".into(),
        html: "<p>Ana</p>".into(),
        is_default: true,
    });
    assert_eq!(signatures.resolve_html(Some("co-1"), Some("u-1")).as_deref(), Some("<p>Standard</p>"));
    assert_eq!(signatures.resolve_html(None, Some("u-1")).as_deref(), Some("<p>Ana</p>"));
    assert_eq!(signatures.default_for_user("u-1", Some("co-9")).map(|s| s.id), Some(personal.id));

    assert!(signatures.remove(&first.id));
    assert_eq!(h.store.companies().get("co-1").unwrap().default_signature_id, None);
}

#[tokio::test]
async fn company_crud_that_moves_the_active_company_switches_cleanly() {
    let h = harness().await;
    h.store
        .session()
        .hydrate(session(company("co-a", true), vec![company("co-b", true)]))
        .await;
    h.store
        .clients()
        .add(ClientDraft { name: "Client A".into(), ..ClientDraft::default() })
        .unwrap();
    let epoch = h.store.snapshot().company_epoch;

    // Nova empresa padrão: vira a ativa pela troca completa
    let (created, _) = h
        .store
        .companies()
        .add(CompanyDraft {
            name: "Filiale".into(),
            is_default: Some(true),
            vat_enabled: Some(false),
            ..CompanyDraft::default()
        })
        .unwrap();
    let snapshot = h.store.snapshot();
    assert_eq!(snapshot.active_company_id.as_deref(), Some(created.id.as_str()));
    assert!(snapshot.clients.is_empty());
    assert_eq!(snapshot.company_epoch, epoch + 1);
    assert!(!snapshot.vat_enabled);
    assert_eq!(h.storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().as_deref(), Some(created.id.as_str()));
    assert_eq!(h.backend.company_scope().as_deref(), Some(created.id.as_str()));

    // Remover a ativa devolve a atividade à nova padrão
    h.store.companies().remove(&created.id).unwrap();
    let snapshot = h.store.snapshot();
    assert_eq!(snapshot.active_company_id.as_deref(), Some("co-a"));
    assert_eq!(snapshot.company_epoch, epoch + 2);
    assert!(snapshot.vat_enabled);
    assert_eq!(h.storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().as_deref(), Some("co-a"));

    // Editar uma empresa sem mexer na ativa não limpa nada
    h.store
        .clients()
        .add(ClientDraft { name: "Client A2".into(), ..ClientDraft::default() })
        .unwrap();
    h.store
        .companies()
        .update("co-b", CompanyPatch { city: Some("Lyon".into()), ..CompanyPatch::default() })
        .unwrap();
    let snapshot = h.store.snapshot();
    assert_eq!(snapshot.clients.len(), 1);
    assert_eq!(snapshot.company_epoch, epoch + 2);
}
