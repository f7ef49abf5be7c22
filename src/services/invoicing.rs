// src/services/invoicing.rs

use chrono::NaiveDate;

use crate::{
    common::{error::AppError, ids::IdGenerator},
    models::engagement::{Engagement, EngagementKind, EngagementStatus},
};

/// Um serviço realizado e ainda sem número de fatura gera uma fatura.
///
/// `previous` é o status antes da atualização (`None` na criação); só a
/// transição para `réalisé` dispara, nunca um novo salvamento.
pub fn should_auto_invoice(previous: Option<EngagementStatus>, current: &Engagement) -> bool {
    current.kind == EngagementKind::Service
        && current.status == EngagementStatus::Completed
        && current.invoice_number.is_none()
        && previous != Some(EngagementStatus::Completed)
}

/// Já existe fatura para o mesmo cliente, serviço e dia?
pub fn has_matching_invoice<'a>(mut engagements: impl Iterator<Item = &'a Engagement>, source: &Engagement) -> bool {
    engagements.any(|e| {
        e.kind == EngagementKind::Invoice
            && e.client_id == source.client_id
            && e.service_id == source.service_id
            && e.scheduled_date() == source.scheduled_date()
    })
}

pub fn format_invoice_number(date: NaiveDate, suffix: u16) -> String {
    format!("FAC-{}-{:04}", date.format("%Y%m%d"), suffix % 10_000)
}

/// Sorteia números até achar um livre, no máximo `attempts` vezes.
pub fn unique_invoice_number<'a>(
    date: NaiveDate,
    ids: &dyn IdGenerator,
    existing: impl Iterator<Item = &'a Engagement> + Clone,
    attempts: u32,
) -> Result<String, AppError> {
    for _ in 0..attempts.max(1) {
        let candidate = format_invoice_number(date, ids.invoice_suffix());
        let taken = existing.clone().any(|e| e.invoice_number.as_deref() == Some(candidate.as_str()));
        if !taken {
            return Ok(candidate);
        }
        tracing::debug!("Número de fatura {} já usado, sorteando outro", candidate);
    }
    Err(AppError::InvoiceNumberExhausted(attempts.max(1)))
}

/// A fatura copia o serviço de origem; o id e o número vêm de fora.
pub fn build_invoice(source: &Engagement, id: String, invoice_number: String) -> Engagement {
    Engagement {
        id,
        kind: EngagementKind::Invoice,
        status: EngagementStatus::Completed,
        invoice_number: Some(invoice_number),
        send_history: Vec::new(),
        quote_status: None,
        ..source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::SequentialIds;
    use crate::services::pricing::tests::engagement;

    fn completed() -> Engagement {
        let mut e = engagement("e-1", "s1", &["o1"]);
        e.status = EngagementStatus::Completed;
        e
    }

    #[test]
    fn trigger_fires_only_on_the_transition() {
        let done = completed();
        assert!(should_auto_invoice(None, &done));
        assert!(should_auto_invoice(Some(EngagementStatus::Scheduled), &done));
        assert!(!should_auto_invoice(Some(EngagementStatus::Completed), &done));

        let mut invoiced = completed();
        invoiced.invoice_number = Some("FAC-20240610-0001".into());
        assert!(!should_auto_invoice(None, &invoiced));

        let mut quote = completed();
        quote.kind = EngagementKind::Quote;
        assert!(!should_auto_invoice(None, &quote));
    }

    #[test]
    fn invoice_guard_matches_client_service_and_day() {
        let source = completed();
        let mut later_same_day = build_invoice(&source, "e-2".into(), "FAC-1".into());
        later_same_day.scheduled_at += chrono::Duration::hours(3);
        assert!(has_matching_invoice([later_same_day.clone()].iter(), &source));

        let mut other_day = later_same_day;
        other_day.scheduled_at += chrono::Duration::days(1);
        assert!(!has_matching_invoice([other_day].iter(), &source));
    }

    #[test]
    fn colliding_numbers_are_redrawn_then_exhausted() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut taken = completed();
        taken.invoice_number = Some("FAC-20240610-0042".into());
        let existing = vec![taken];

        let ids = SequentialIds::with_invoice_suffixes(vec![42, 43]);
        assert_eq!(unique_invoice_number(date, &ids, existing.iter(), 5).unwrap(), "FAC-20240610-0043");

        let stuck = SequentialIds::with_invoice_suffixes(vec![42]);
        assert!(matches!(
            unique_invoice_number(date, &stuck, existing.iter(), 3),
            Err(AppError::InvoiceNumberExhausted(3))
        ));
    }

    #[test]
    fn invoice_copies_the_source() {
        let mut source = completed();
        source.additional_charge = Some(crate::common::money::Money::from_cents(1000));
        source.contact_ids = vec!["ct-1".into()];
        let invoice = build_invoice(&source, "e-9".into(), "FAC-20240610-0007".into());
        assert_eq!(invoice.kind, EngagementKind::Invoice);
        assert_eq!(invoice.client_id, source.client_id);
        assert_eq!(invoice.option_ids, source.option_ids);
        assert_eq!(invoice.additional_charge, source.additional_charge);
        assert_eq!(invoice.contact_ids, source.contact_ids);
        // A fatura nunca dispara outra fatura
        assert!(!should_auto_invoice(None, &invoice));
    }
}
