//src/main.rs

use std::sync::Arc;

use erp_domain_store::{
    DomainStore, Money, StoreConfig,
    db::MemoryStorage,
    models::{
        catalog::{OptionDraft, ServiceDraft},
        client::ClientDraft,
        company::Company,
        engagement::{EngagementDraft, EngagementStatus},
        settings::{BackendUserSnapshot, SessionPayload, SessionSettings},
    },
    remote::InMemoryBackend,
    telemetry,
};

// Demonstração: sessão hidratada contra o backend em memória, um cliente, um
// serviço e uma prestação realizada (que gera a própria fatura).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuração e logs
    let config = StoreConfig::from_env()?;
    telemetry::init(&config.log_filter);

    // 2. Store sobre o backend simulado, sem tocar no disco
    let backend = Arc::new(InMemoryBackend::new());
    let store = DomainStore::builder()
        .backend(backend.clone())
        .storage(Arc::new(MemoryStorage::new()))
        .config(config)
        .build()
        .await?;

    // 3. Sessão vinda do "servidor"
    let mut company = Company::named("co-demo", "Wash&Go Lyon");
    company.is_default = true;
    let user = store
        .session()
        .hydrate(SessionPayload {
            user: BackendUserSnapshot {
                id: "u-demo".into(),
                username: "demo".into(),
                full_name: Some("Utilisateur démo".into()),
                pages: vec!["*".into()],
                permissions: vec!["*".into()],
                ..BackendUserSnapshot::default()
            },
            company: Some(company),
            companies: None,
            settings: SessionSettings::default(),
        })
        .await;

    // 4. Catálogo, cliente e uma prestação já realizada
    let (service, _) = store.catalog().add(ServiceDraft {
        category: "Lavage".into(),
        name: "Nettoyage intérieur".into(),
        options: vec![OptionDraft {
            label: "Aspiration".into(),
            default_duration_min: 30,
            unit_price_ht: Money::from_units(25),
            active: true,
            ..OptionDraft::default()
        }],
        active: true,
        ..ServiceDraft::default()
    })?;
    let (client, _) = store.clients().add(ClientDraft {
        name: "Garage du Parc".into(),
        email: Some("contact@garage-du-parc.fr".into()),
        ..ClientDraft::default()
    })?;
    let saved = store.engagements().add(EngagementDraft {
        client_id: client.id.clone(),
        service_id: service.id.clone(),
        option_ids: service.options.iter().map(|o| o.id.clone()).collect(),
        status: Some(EngagementStatus::Completed),
        ..EngagementDraft::default()
    })?;

    let totals = store.engagements().totals(&saved.engagement);
    saved.ticket.settled().await;
    if let Some((invoice, ticket)) = saved.invoice {
        ticket.settled().await;
        tracing::info!("🧾 Fatura {}", invoice.invoice_number.unwrap_or_default());
    }

    // 5. Resumo
    let snapshot = store.snapshot();
    tracing::info!(
        "✅ Usuário '{}' na empresa {}: {} cliente(s), {} serviço(s), {} engagement(s), total {} ({} min)",
        user.username,
        snapshot.active_company_id.as_deref().unwrap_or("nenhuma"),
        snapshot.clients.len(),
        snapshot.services.len(),
        snapshot.engagements.len(),
        totals.billed(),
        totals.duration
    );
    if !store.failed_operations().is_empty() {
        tracing::warn!("⚠️ {} operação(ões) em falha", store.failed_operations().len());
    }
    Ok(())
}
