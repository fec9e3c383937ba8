//! Final aggregation over a job's assets, variants and failures.

use creative_core::types::{CampaignJob, ExecutionReport};

use crate::pipeline::PipelineOutcome;

/// Pure, idempotent aggregation; called exactly once per job at the
/// transition to a terminal state.
pub struct ExecutionReporter;

impl ExecutionReporter {
    pub fn finalize(job: &CampaignJob, outcome: &PipelineOutcome) -> ExecutionReport {
        let variants_rendered: u64 = outcome.products.iter().map(|p| p.variants.len() as u64).sum();
        let variants_failed: u64 = outcome
            .products
            .iter()
            .map(|p| p.variant_failures.len() as u64)
            .sum();
        let passed: u64 = outcome
            .products
            .iter()
            .flat_map(|p| &p.variants)
            .filter(|v| v.compliant)
            .count() as u64;
        let compliance_pass_rate = if variants_rendered == 0 {
            0.0
        } else {
            passed as f64 / variants_rendered as f64
        };

        let duration_secs = match (job.started_at, job.completed_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };

        ExecutionReport {
            campaign_id: job.id,
            campaign_name: job.brief.campaign_name.clone(),
            assets_generated: outcome.assets_generated(),
            assets_reused: outcome.assets_reused(),
            total_cost: outcome.total_cost(),
            variants_rendered,
            variants_failed,
            compliance_pass_rate,
            legal_flag_count: outcome.legal_flags.len() as u64,
            translation_fallback_count: outcome.translation_fallbacks,
            product_failure_count: outcome
                .products
                .iter()
                .filter(|p| p.failure.is_some())
                .count() as u64,
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProductOutcome;
    use chrono::{Duration, Utc};
    use creative_core::brief::CampaignBrief;
    use creative_core::types::{AspectRatio, JobStatus, Variant};
    use serde_json::json;
    use std::path::PathBuf;

    fn job() -> CampaignJob {
        let brief = CampaignBrief::from_value(json!({
            "campaign_name": "Summer Launch",
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts",
        }))
        .unwrap();
        let mut job = CampaignJob::new(brief);
        job.status = JobStatus::Completed;
        job.started_at = Some(Utc::now() - Duration::seconds(30));
        job.completed_at = Some(Utc::now());
        job
    }

    fn variant(compliant: bool) -> Variant {
        Variant {
            aspect_ratio: AspectRatio::Square,
            language: "en".into(),
            location: PathBuf::from("out.png"),
            compliance_score: if compliant { 0.9 } else { 0.3 },
            compliant,
        }
    }

    #[test]
    fn test_finalize_aggregates_and_is_idempotent() {
        let job = job();
        let outcome = PipelineOutcome {
            products: vec![
                ProductOutcome {
                    product: "Solar Lamp".into(),
                    asset: None,
                    generated: true,
                    cost: 0.04,
                    variants: vec![variant(true), variant(true), variant(false)],
                    variant_failures: Vec::new(),
                    failure: None,
                },
                ProductOutcome {
                    product: "Trail Pack".into(),
                    asset: None,
                    generated: false,
                    cost: 0.0,
                    variants: Vec::new(),
                    variant_failures: Vec::new(),
                    failure: Some("generation failed".into()),
                },
            ],
            legal_flags: Vec::new(),
            translation_fallbacks: 1,
        };

        let report = ExecutionReporter::finalize(&job, &outcome);
        assert_eq!(report.assets_generated, 1);
        assert_eq!(report.assets_reused, 0);
        assert_eq!(report.variants_rendered, 3);
        assert!((report.compliance_pass_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.product_failure_count, 1);
        assert_eq!(report.translation_fallback_count, 1);
        assert!(report.duration_secs >= 30.0);

        let again = ExecutionReporter::finalize(&job, &outcome);
        assert_eq!(again.assets_generated, report.assets_generated);
        assert!((again.total_cost - report.total_cost).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_variants_is_zero_pass_rate() {
        let job = job();
        let outcome = PipelineOutcome::default();
        let report = ExecutionReporter::finalize(&job, &outcome);
        assert!((report.compliance_pass_rate).abs() < f64::EPSILON);
        assert_eq!(report.variants_rendered, 0);
    }
}
