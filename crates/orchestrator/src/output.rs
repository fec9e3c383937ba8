//! Output layout:
//! `output/{campaign}/{product}/{language}/{ratio}/{product}_final.png`
//! plus per-variant metadata, a campaign summary and the execution
//! report in structured and human-readable form.

use std::path::{Path, PathBuf};

use chrono::Utc;
use creative_core::error::PipelineResult;
use creative_core::types::{CampaignJob, ExecutionReport};
use serde_json::json;
use tracing::info;

use crate::pipeline::PipelineOutcome;

/// Write every artifact for a finished job under the campaign's output
/// directory. Variant images were already written by the renderer.
pub async fn write_job_outputs(
    output_dir: &Path,
    job: &CampaignJob,
    outcome: &PipelineOutcome,
    report: &ExecutionReport,
) -> PipelineResult<PathBuf> {
    let campaign_dir = output_dir.join(job.brief.dir_name());
    tokio::fs::create_dir_all(&campaign_dir).await?;

    for product in &outcome.products {
        for variant in &product.variants {
            let metadata = json!({
                "campaign": job.brief.campaign_name,
                "product": product.product,
                "language": variant.language,
                "aspect_ratio": variant.aspect_ratio,
                "compliance_score": variant.compliance_score,
                "compliant": variant.compliant,
                "image": variant.location,
                "written_at": Utc::now(),
            });
            let path = metadata_path(&variant.location);
            tokio::fs::write(&path, serde_json::to_string_pretty(&metadata)?).await?;
        }
    }

    let summary = json!({
        "campaign_id": job.id,
        "campaign_name": job.brief.campaign_name,
        "status": job.status,
        "message": job.brief.campaign_message,
        "languages": job.brief.languages,
        "products": outcome.products,
        "legal_flags": outcome.legal_flags,
    });
    tokio::fs::write(
        campaign_dir.join("campaign_summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )
    .await?;

    tokio::fs::write(
        campaign_dir.join("execution_report.json"),
        serde_json::to_string_pretty(report)?,
    )
    .await?;
    tokio::fs::write(
        campaign_dir.join("execution_report.txt"),
        human_readable_report(report),
    )
    .await?;

    info!(dir = %campaign_dir.display(), "job outputs written");
    Ok(campaign_dir)
}

/// `{stem}_metadata.json` next to the variant image.
fn metadata_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "variant".to_string());
    image.with_file_name(format!("{stem}_metadata.json"))
}

/// Plain-text report for humans and CI logs.
pub fn human_readable_report(report: &ExecutionReport) -> String {
    format!(
        "EXECUTION REPORT\n\
         ================\n\
         Campaign:            {name} ({id})\n\
         Assets generated:    {generated}\n\
         Assets reused:       {reused}\n\
         Total cost:          ${cost:.3}\n\
         Variants rendered:   {rendered}\n\
         Variants failed:     {vfailed}\n\
         Compliance pass:     {pass:.0}%\n\
         Legal flags:         {legal}\n\
         Translation fallbacks: {fallbacks}\n\
         Product failures:    {pfailed}\n\
         Duration:            {duration:.1}s\n",
        name = report.campaign_name,
        id = report.campaign_id,
        generated = report.assets_generated,
        reused = report.assets_reused,
        cost = report.total_cost,
        rendered = report.variants_rendered,
        vfailed = report.variants_failed,
        pass = report.compliance_pass_rate * 100.0,
        legal = report.legal_flag_count,
        fallbacks = report.translation_fallback_count,
        pfailed = report.product_failure_count,
        duration = report.duration_secs,
    )
}
