// src/services/pricing.rs

// Motor de preço/duração. Funções puras: nunca alteram a entrada e podem ser
// recalculadas a qualquer momento (os totais não são armazenados).

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::common::money::Money;
use crate::models::{
    catalog::{Category, Service, ServiceOption},
    client::Client,
    engagement::{
        Engagement, EngagementLine, EngagementStatus, EngagementTotals, OptionOverride,
        OptionOverrides, Slot,
    },
};

/// Categorias fixas do resumo do catálogo.
pub const SUMMARY_CATEGORIES: [&str; 4] = ["Voiture", "Canapé", "Textile", "Autre"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub total: usize,
    pub active: usize,
    pub average_price: Money,
    pub average_duration: f64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverview {
    pub total_services: usize,
    pub total_active: usize,
    pub average_price: Money,
    pub average_duration: f64,
    pub revenue: Money,
}

/// Mantém só as chaves presentes em `option_ids`; quantidade >= 1 (padrão 1),
/// preço >= 0.
pub fn sanitize_option_overrides(option_ids: &[String], overrides: &OptionOverrides) -> OptionOverrides {
    overrides
        .iter()
        .filter(|(option_id, _)| option_ids.contains(option_id))
        .map(|(option_id, value)| {
            let sanitized = OptionOverride {
                quantity: Some(value.quantity.map_or(1, |q| q.max(1))),
                unit_price_ht: value.unit_price_ht.map(Money::clamp_non_negative),
                duration_min: value.duration_min,
            };
            (option_id.clone(), sanitized)
        })
        .collect()
}

/// Aplica [`sanitize_option_overrides`] a cada linha; quantidade da linha >= 1.
pub fn sanitize_lines(lines: Vec<EngagementLine>) -> Vec<EngagementLine> {
    lines
        .into_iter()
        .map(|mut line| {
            line.option_overrides = sanitize_option_overrides(&line.option_ids, &line.option_overrides);
            line.quantity = line.quantity.map(|q| q.max(1));
            line
        })
        .collect()
}

fn find_service<'a>(catalog: &'a [Service], service_id: &str) -> Option<&'a Service> {
    catalog.iter().find(|s| s.id == service_id)
}

fn find_category<'a>(categories: &'a [Category], category_id: Option<&str>) -> Option<&'a Category> {
    let id = category_id?;
    categories.iter().find(|c| c.id == id)
}

// Opções do serviço marcadas na seleção, na ordem do catálogo
fn selected_options<'a>(service: &'a Service, option_ids: &'a [String]) -> impl Iterator<Item = &'a ServiceOption> {
    service.options.iter().filter(move |o| option_ids.contains(&o.id))
}

fn override_quantity(overrides: &OptionOverrides, option_id: &str) -> u32 {
    overrides
        .get(option_id)
        .and_then(|o| o.quantity)
        .filter(|q| *q > 0)
        .unwrap_or(1)
}

fn options_price(service: &Service, option_ids: &[String], overrides: &OptionOverrides) -> Money {
    selected_options(service, option_ids)
        .map(|option| {
            let unit = overrides
                .get(&option.id)
                .and_then(|o| o.unit_price_ht)
                .unwrap_or(option.unit_price_ht);
            unit.times(override_quantity(overrides, &option.id))
        })
        .sum()
}

fn options_duration(service: &Service, option_ids: &[String], overrides: &OptionOverrides) -> u32 {
    selected_options(service, option_ids)
        .map(|option| {
            let minutes = overrides
                .get(&option.id)
                .and_then(|o| o.duration_min)
                .unwrap_or(option.default_duration_min);
            minutes.saturating_mul(override_quantity(overrides, &option.id))
        })
        .fold(0u32, u32::saturating_add)
}

// Uma linha do modo multi-serviço; `None` quando o serviço não existe mais
fn line_totals(line: &EngagementLine, catalog: &[Service], categories: &[Category]) -> Option<(Money, u32)> {
    let service = find_service(catalog, &line.service_id)?;
    let quantity = line.quantity.unwrap_or(1);
    let overrides = sanitize_option_overrides(&line.option_ids, &line.option_overrides);

    let price = match service.base_price {
        Some(base) => base,
        None if !line.option_ids.is_empty() => options_price(service, &line.option_ids, &overrides),
        None => Money::ZERO,
    };
    let duration = match service.base_duration {
        Some(base) => base,
        None if !line.option_ids.is_empty() => options_duration(service, &line.option_ids, &overrides),
        None => 0,
    };

    let sub_category = find_category(categories, line.sub_category_id.as_deref());
    let sub_price = sub_category.and_then(|c| c.price_ht).unwrap_or(Money::ZERO);
    let sub_duration = sub_category.and_then(|c| c.default_duration_min).unwrap_or(0);

    Some(((price + sub_price).times(quantity), duration.saturating_add(sub_duration).saturating_mul(quantity)))
}

/// Duração estimada do orçamento (modo legado), sem a sub-categoria.
pub fn compute_estimated_duration(engagement: &Engagement, catalog: &[Service]) -> u32 {
    let Some(service) = find_service(catalog, &engagement.service_id) else {
        return 0;
    };
    let overrides = sanitize_option_overrides(&engagement.option_ids, &engagement.option_overrides);
    if selected_options(service, &engagement.option_ids).next().is_none() {
        return service.base_duration.unwrap_or(0);
    }
    options_duration(service, &engagement.option_ids, &overrides)
}

/// Preço, duração e acréscimo de um engagement.
///
/// O acréscimo (`additional_charge`) é devolvido à parte e nunca somado ao
/// preço; quem agrega receita soma os dois.
pub fn compute_totals(engagement: &Engagement, catalog: &[Service], categories: &[Category]) -> EngagementTotals {
    let surcharge = engagement.additional_charge.unwrap_or(Money::ZERO);

    if engagement.is_multi_line() {
        let mut price = Money::ZERO;
        let mut duration = 0u32;
        for line in &engagement.services {
            match line_totals(line, catalog, categories) {
                Some((line_price, line_duration)) => {
                    price += line_price;
                    duration = duration.saturating_add(line_duration);
                }
                None => tracing::warn!(
                    "⚠️ Serviço {} não encontrado no catálogo (engagement {})",
                    line.service_id,
                    engagement.id
                ),
            }
        }
        return EngagementTotals { price, duration, surcharge };
    }

    // Modo legado: um único serviço
    let Some(service) = find_service(catalog, &engagement.service_id) else {
        tracing::warn!(
            "⚠️ Serviço {} não encontrado (engagement {}, catálogo com {} serviços)",
            engagement.service_id,
            engagement.id,
            catalog.len()
        );
        return EngagementTotals { price: Money::ZERO, duration: 0, surcharge };
    };

    let overrides = sanitize_option_overrides(&engagement.option_ids, &engagement.option_overrides);
    let has_selection = selected_options(service, &engagement.option_ids).next().is_some();
    if !has_selection && !engagement.option_ids.is_empty() {
        tracing::warn!(
            "⚠️ Nenhuma das opções {:?} existe no serviço {}",
            engagement.option_ids,
            service.name
        );
    }

    let base_price = if has_selection {
        options_price(service, &engagement.option_ids, &overrides)
    } else {
        service.base_price.unwrap_or(Money::ZERO)
    };

    let sub_category = find_category(categories, engagement.sub_category_id.as_deref());
    let price = base_price + sub_category.and_then(|c| c.price_ht).unwrap_or(Money::ZERO);

    // A duração capturada em campo é autoritativa depois de réalisé
    let duration = match engagement.mobile_duration_minutes {
        Some(real) if engagement.status == EngagementStatus::Completed && real > 0 => real,
        _ => compute_estimated_duration(engagement, catalog)
            .saturating_add(sub_category.and_then(|c| c.default_duration_min).unwrap_or(0)),
    };

    EngagementTotals { price, duration, surcharge }
}

pub fn build_slots(engagements: &[Engagement], catalog: &[Service], categories: &[Category]) -> Vec<Slot> {
    engagements
        .iter()
        .map(|engagement| {
            let totals = compute_totals(engagement, catalog, categories);
            Slot {
                id: format!("slot-{}", engagement.id),
                date: engagement.scheduled_date(),
                start: engagement.scheduled_at,
                end: engagement.scheduled_at + Duration::minutes(i64::from(totals.duration)),
                engagement_id: engagement.id.clone(),
            }
        })
        .collect()
}

/// Receita do cliente: preço + acréscimo dos engagements não cancelados.
pub fn client_revenue(client_id: &str, engagements: &[Engagement], catalog: &[Service], categories: &[Category]) -> Money {
    engagements
        .iter()
        .filter(|e| e.client_id == client_id && e.status != EngagementStatus::Cancelled)
        .map(|e| compute_totals(e, catalog, categories).billed())
        .sum()
}

/// Tarifa negociada na grade do cliente, senão o preço padrão informado.
pub fn applicable_price(client: &Client, service_id: &str, option_id: &str, default_price: Money) -> Money {
    client
        .pricing_grid
        .as_ref()
        .and_then(|grid| grid.custom_price(service_id, option_id))
        .unwrap_or(default_price)
}

// Opções ativas, ou todas quando nenhuma está ativa
fn reference_options(service: &Service) -> Vec<&ServiceOption> {
    let active: Vec<&ServiceOption> = service.options.iter().filter(|o| o.active).collect();
    if active.is_empty() { service.options.iter().collect() } else { active }
}

fn service_average_price(service: &Service) -> Decimal {
    let options = reference_options(service);
    if options.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = options.iter().map(|o| o.unit_price_ht.to_decimal()).sum();
    total / Decimal::from(options.len())
}

fn service_average_duration(service: &Service) -> f64 {
    let options = reference_options(service);
    if options.is_empty() {
        return 0.0;
    }
    let total: u32 = options.iter().map(|o| o.default_duration_min).sum();
    f64::from(total) / options.len() as f64
}

// Acumulador comum ao resumo por categoria e à visão geral
#[derive(Default)]
struct CatalogAggregate {
    total: usize,
    active: usize,
    price_sum: Decimal,
    duration_sum: f64,
    revenue: Money,
}

impl CatalogAggregate {
    fn collect<'a>(
        services: impl Iterator<Item = &'a Service>,
        engagements: &[Engagement],
        catalog: &[Service],
        categories: &[Category],
    ) -> Self {
        let mut acc = CatalogAggregate::default();
        for service in services {
            acc.revenue += engagements
                .iter()
                .filter(|e| e.service_id == service.id)
                .map(|e| compute_totals(e, catalog, categories).billed())
                .sum::<Money>();
            acc.total += 1;
            if service.active {
                acc.active += 1;
            }
            acc.price_sum += service_average_price(service);
            acc.duration_sum += service_average_duration(service);
        }
        acc
    }

    fn average_price(&self) -> Money {
        if self.total == 0 {
            return Money::ZERO;
        }
        Money::from_decimal(self.price_sum / Decimal::from(self.total))
    }

    fn average_duration(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.duration_sum / self.total as f64 }
    }
}

pub fn service_category_summary(
    catalog: &[Service],
    engagements: &[Engagement],
    categories: &[Category],
) -> Vec<CategorySummary> {
    SUMMARY_CATEGORIES
        .iter()
        .map(|category| {
            let aggregate = CatalogAggregate::collect(
                catalog.iter().filter(|s| s.category == *category),
                engagements,
                catalog,
                categories,
            );
            CategorySummary {
                category: category.to_string(),
                total: aggregate.total,
                active: aggregate.active,
                average_price: aggregate.average_price(),
                average_duration: aggregate.average_duration(),
                revenue: aggregate.revenue,
            }
        })
        .collect()
}

pub fn service_overview(catalog: &[Service], engagements: &[Engagement], categories: &[Category]) -> ServiceOverview {
    let aggregate = CatalogAggregate::collect(catalog.iter(), engagements, catalog, categories);
    ServiceOverview {
        total_services: aggregate.total,
        total_active: aggregate.active,
        average_price: aggregate.average_price(),
        average_duration: aggregate.average_duration(),
        revenue: aggregate.revenue,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::engagement::{EngagementKind, SupportType};
    use chrono::{TimeZone, Utc};

    pub(crate) fn option(id: &str, price_cents: i64, minutes: u32) -> ServiceOption {
        ServiceOption {
            id: id.into(),
            label: id.to_uppercase(),
            description: None,
            default_duration_min: minutes,
            unit_price_ht: Money::from_cents(price_cents),
            tva_pct: None,
            active: true,
        }
    }

    pub(crate) fn service(id: &str, options: Vec<ServiceOption>) -> Service {
        Service {
            id: id.into(),
            category: "Voiture".into(),
            name: format!("Service {}", id),
            description: None,
            options,
            active: true,
            base_price: None,
            base_duration: None,
        }
    }

    pub(crate) fn engagement(id: &str, service_id: &str, option_ids: &[&str]) -> Engagement {
        Engagement {
            id: id.into(),
            client_id: "c-1".into(),
            company_id: None,
            service_id: service_id.into(),
            option_ids: option_ids.iter().map(|s| s.to_string()).collect(),
            option_overrides: OptionOverrides::new(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap(),
            status: EngagementStatus::Scheduled,
            kind: EngagementKind::Service,
            support_type: SupportType::Car,
            support_detail: String::new(),
            additional_charge: None,
            contact_ids: vec![],
            assigned_user_ids: vec![],
            send_history: vec![],
            invoice_number: None,
            invoice_vat_enabled: None,
            quote_number: None,
            quote_status: None,
            quote_name: None,
            mobile_duration_minutes: None,
            mobile_completion_comment: None,
            planning_user: None,
            start_time: None,
            main_category_id: None,
            sub_category_id: None,
            services: vec![],
        }
    }

    fn sub_category(id: &str, price_cents: i64, minutes: u32) -> Category {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Category {
            id: id.into(),
            name: "Citadine".into(),
            description: None,
            active: true,
            parent_id: Some("cat-root".into()),
            created_at: now,
            updated_at: now,
            price_ht: Some(Money::from_cents(price_cents)),
            default_duration_min: Some(minutes),
        }
    }

    #[test]
    fn single_option_with_surcharge() {
        let catalog = vec![service("s1", vec![option("o1", 5000, 30)])];
        let mut e = engagement("e1", "s1", &["o1"]);
        e.additional_charge = Some(Money::from_units(10));

        let totals = compute_totals(&e, &catalog, &[]);
        assert_eq!(totals, EngagementTotals { price: Money::from_units(50), duration: 30, surcharge: Money::from_units(10) });
        assert_eq!(totals.billed(), Money::from_units(60));
        // Recalcular não muda nada
        assert_eq!(compute_totals(&e, &catalog, &[]), totals);
    }

    #[test]
    fn multi_line_base_price_times_quantity() {
        let mut s = service("s1", vec![option("o1", 9900, 90)]);
        s.base_price = Some(Money::from_units(20));
        s.base_duration = Some(15);
        let mut e = engagement("e1", "", &[]);
        e.services = vec![EngagementLine {
            service_id: "s1".into(),
            option_ids: vec!["o1".into()],
            quantity: Some(3),
            ..EngagementLine::default()
        }];

        let totals = compute_totals(&e, &[s], &[]);
        assert_eq!(totals.price, Money::from_units(60));
        assert_eq!(totals.duration, 45);
    }

    #[test]
    fn multi_line_adds_sub_category_and_skips_unknown_services() {
        let catalog = vec![service("s1", vec![option("o1", 1000, 10), option("o2", 500, 5)])];
        let mut overrides = OptionOverrides::new();
        overrides.insert("o2".into(), OptionOverride { quantity: Some(2), unit_price_ht: Some(Money::from_cents(700)), duration_min: Some(8) });

        let mut e = engagement("e1", "", &[]);
        e.services = vec![
            EngagementLine {
                service_id: "s1".into(),
                option_ids: vec!["o1".into(), "o2".into()],
                option_overrides: overrides,
                sub_category_id: Some("sub".into()),
                quantity: Some(2),
                ..EngagementLine::default()
            },
            EngagementLine { service_id: "ghost".into(), ..EngagementLine::default() },
        ];

        let totals = compute_totals(&e, &catalog, &[sub_category("sub", 250, 5)]);
        // (10 + 7×2 + 2.50) × 2
        assert_eq!(totals.price, Money::from_cents(5300));
        // (10 + 8×2 + 5) × 2
        assert_eq!(totals.duration, 62);
    }

    #[test]
    fn missing_service_keeps_only_the_surcharge() {
        let mut e = engagement("e1", "ghost", &["o1"]);
        e.additional_charge = Some(Money::from_cents(1500));
        let totals = compute_totals(&e, &[], &[]);
        assert_eq!(totals, EngagementTotals { price: Money::ZERO, duration: 0, surcharge: Money::from_cents(1500) });
    }

    #[test]
    fn mobile_duration_wins_once_completed() {
        let catalog = vec![service("s1", vec![option("o1", 5000, 30)])];
        let mut e = engagement("e1", "s1", &["o1"]);
        e.mobile_duration_minutes = Some(45);
        assert_eq!(compute_totals(&e, &catalog, &[]).duration, 30);

        e.status = EngagementStatus::Completed;
        assert_eq!(compute_totals(&e, &catalog, &[]).duration, 45);
        assert_eq!(compute_estimated_duration(&e, &catalog), 30);
    }

    #[test]
    fn legacy_mode_falls_back_to_base_values() {
        let mut s = service("s1", vec![option("o1", 5000, 30)]);
        s.base_price = Some(Money::from_units(35));
        s.base_duration = Some(40);
        let e = engagement("e1", "s1", &[]);
        let totals = compute_totals(&e, &[s], &[sub_category("unused", 100, 1)]);
        assert_eq!(totals.price, Money::from_units(35));
        assert_eq!(totals.duration, 40);
    }

    #[test]
    fn sanitize_drops_foreign_keys_and_clamps_values() {
        let mut overrides = OptionOverrides::new();
        overrides.insert("kept".into(), OptionOverride { quantity: Some(0), unit_price_ht: Some(Money::from_cents(-300)), duration_min: Some(12) });
        overrides.insert("stale".into(), OptionOverride::default());

        let sanitized = sanitize_option_overrides(&["kept".to_string()], &overrides);
        assert_eq!(sanitized.len(), 1);
        let kept = sanitized["kept"];
        assert_eq!(kept.quantity, Some(1));
        assert_eq!(kept.unit_price_ht, Some(Money::ZERO));
        assert_eq!(kept.duration_min, Some(12));
    }

    #[test]
    fn line_overrides_are_sanitized_per_line() {
        let mut overrides = OptionOverrides::new();
        overrides.insert("o1".into(), OptionOverride { quantity: Some(2), ..OptionOverride::default() });
        overrides.insert("ghost".into(), OptionOverride::default());
        let line = EngagementLine {
            service_id: "s1".into(),
            option_ids: vec!["o1".into()],
            option_overrides: overrides,
            quantity: Some(0),
            ..EngagementLine::default()
        };

        let lines = sanitize_lines(vec![line]);
        assert_eq!(lines[0].option_overrides.keys().collect::<Vec<_>>(), vec!["o1"]);
        assert_eq!(lines[0].option_overrides["o1"].quantity, Some(2));
        assert_eq!(lines[0].quantity, Some(1));
    }

    #[test]
    fn sub_category_duration_saturates() {
        let mut s = service("s1", vec![]);
        s.base_duration = Some(u32::MAX);
        let mut e = engagement("e1", "s1", &[]);
        e.services = vec![EngagementLine {
            service_id: "s1".into(),
            sub_category_id: Some("sub".into()),
            ..EngagementLine::default()
        }];
        let totals = compute_totals(&e, &[s], &[sub_category("sub", 0, 30)]);
        assert_eq!(totals.duration, u32::MAX);
    }

    #[test]
    fn slots_end_after_the_computed_duration() {
        let catalog = vec![service("s1", vec![option("o1", 5000, 90)])];
        let slots = build_slots(&[engagement("e1", "s1", &["o1"])], &catalog, &[]);
        assert_eq!(slots[0].id, "slot-e1");
        assert_eq!(slots[0].end, Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap());
    }

    #[test]
    fn revenue_ignores_cancelled_engagements() {
        let catalog = vec![service("s1", vec![option("o1", 5000, 30)])];
        let mut kept = engagement("e1", "s1", &["o1"]);
        kept.additional_charge = Some(Money::from_units(5));
        let mut cancelled = engagement("e2", "s1", &["o1"]);
        cancelled.status = EngagementStatus::Cancelled;

        let revenue = client_revenue("c-1", &[kept, cancelled], &catalog, &[]);
        assert_eq!(revenue, Money::from_units(55));
    }

    #[test]
    fn category_summary_averages_active_options() {
        let mut inactive = option("o3", 99_900, 600);
        inactive.active = false;
        let mut sofa = service("s2", vec![option("o2", 3000, 60)]);
        sofa.category = "Canapé".into();
        let catalog = vec![service("s1", vec![option("o1", 5000, 30), option("o1b", 2000, 10), inactive]), sofa];

        let summary = service_category_summary(&catalog, &[engagement("e1", "s1", &["o1"])], &[]);
        assert_eq!(summary.len(), 4);
        let car = &summary[0];
        assert_eq!((car.total, car.active), (1, 1));
        assert_eq!(car.average_price, Money::from_units(35));
        assert!((car.average_duration - 20.0).abs() < f64::EPSILON);
        assert_eq!(car.revenue, Money::from_units(50));
        assert_eq!(summary[3].total, 0);
        assert_eq!(summary[3].average_price, Money::ZERO);

        let overview = service_overview(&catalog, &[], &[]);
        assert_eq!(overview.total_services, 2);
        assert_eq!(overview.average_price, Money::from_cents(3250));
    }
}
