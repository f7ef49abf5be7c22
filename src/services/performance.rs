// src/services/performance.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{
    catalog::Service,
    engagement::{Engagement, EngagementStatus},
};
use crate::services::pricing::compute_estimated_duration;

const UNKNOWN_SERVICE: &str = "Service inconnu";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePerformance {
    pub service_id: String,
    pub service_name: String,
    pub count: usize,
    pub average_estimated_duration: f64,
    pub average_real_duration: f64,
    pub average_deviation: f64,
    pub average_deviation_percentage: f64,
}

/// Estimado (orçamento) vs. real (capturado em campo).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPerformance {
    pub total_completed: usize,
    pub average_estimated_duration: f64,
    pub average_real_duration: f64,
    pub average_deviation: f64,
    pub average_deviation_percentage: f64,
    pub performance_by_service: Vec<ServicePerformance>,
}

#[derive(Default)]
struct Bucket {
    estimated: u64,
    real: u64,
    count: usize,
}

fn deviation_percentage(deviation: f64, estimated: f64) -> f64 {
    if estimated > 0.0 { deviation / estimated * 100.0 } else { 0.0 }
}

pub fn compute_duration_performance(engagements: &[Engagement], services: &[Service]) -> DurationPerformance {
    let completed: Vec<(&Engagement, u32)> = engagements
        .iter()
        .filter(|e| e.status == EngagementStatus::Completed)
        .filter_map(|e| e.mobile_duration_minutes.filter(|m| *m > 0).map(|m| (e, m)))
        .collect();

    if completed.is_empty() {
        return DurationPerformance::default();
    }

    let mut total = Bucket::default();
    // BTreeMap: ordem estável por id de serviço
    let mut per_service: BTreeMap<&str, Bucket> = BTreeMap::new();

    for (engagement, real) in &completed {
        let estimated = u64::from(compute_estimated_duration(engagement, services));
        let real = u64::from(*real);
        total.estimated += estimated;
        total.real += real;

        let bucket = per_service.entry(engagement.service_id.as_str()).or_default();
        bucket.estimated += estimated;
        bucket.real += real;
        bucket.count += 1;
    }

    let count = completed.len() as f64;
    let average_estimated = total.estimated as f64 / count;
    let average_real = total.real as f64 / count;
    let average_deviation = average_real - average_estimated;

    let performance_by_service = per_service
        .into_iter()
        .map(|(service_id, bucket)| {
            let avg_estimated = bucket.estimated as f64 / bucket.count as f64;
            let avg_real = bucket.real as f64 / bucket.count as f64;
            let deviation = avg_real - avg_estimated;
            ServicePerformance {
                service_id: service_id.to_string(),
                service_name: services
                    .iter()
                    .find(|s| s.id == service_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
                count: bucket.count,
                average_estimated_duration: avg_estimated,
                average_real_duration: avg_real,
                average_deviation: deviation,
                average_deviation_percentage: deviation_percentage(deviation, avg_estimated),
            }
        })
        .collect();

    DurationPerformance {
        total_completed: completed.len(),
        average_estimated_duration: average_estimated,
        average_real_duration: average_real,
        average_deviation,
        average_deviation_percentage: deviation_percentage(average_deviation, average_estimated),
        performance_by_service,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::tests::{engagement, option, service};

    #[test]
    fn nothing_completed_gives_a_zeroed_report() {
        let report = compute_duration_performance(&[engagement("e1", "s1", &[])], &[]);
        assert_eq!(report, DurationPerformance::default());
    }

    #[test]
    fn deviation_is_grouped_per_service() {
        let catalog = vec![service("s1", vec![option("o1", 5000, 60)])];
        let mut fast = engagement("e1", "s1", &["o1"]);
        fast.status = EngagementStatus::Completed;
        fast.mobile_duration_minutes = Some(45);
        let mut slow = engagement("e2", "s1", &["o1"]);
        slow.status = EngagementStatus::Completed;
        slow.mobile_duration_minutes = Some(90);
        let mut orphan = engagement("e3", "gone", &[]);
        orphan.status = EngagementStatus::Completed;
        orphan.mobile_duration_minutes = Some(30);
        // Sem duração real: ignorado
        let mut ignored = engagement("e4", "s1", &["o1"]);
        ignored.status = EngagementStatus::Completed;

        let report = compute_duration_performance(&[fast, slow, orphan, ignored], &catalog);
        assert_eq!(report.total_completed, 3);
        assert!((report.average_estimated_duration - 40.0).abs() < 1e-9);
        assert!((report.average_real_duration - 55.0).abs() < 1e-9);

        let gone = &report.performance_by_service[0];
        assert_eq!(gone.service_name, "Service inconnu");
        assert_eq!(gone.average_deviation_percentage, 0.0);

        let s1 = &report.performance_by_service[1];
        assert_eq!(s1.count, 2);
        assert!((s1.average_deviation - 7.5).abs() < 1e-9);
        assert!((s1.average_deviation_percentage - 12.5).abs() < 1e-9);
    }
}
