//! Host-side analyzer and report sink for `tessera analyze`.
//!
//! The engine runs analysis under the same job control as sync but leaves
//! the heuristics to the host. This one checks structural readiness of an
//! item for retrieval: enough body text, a usable title, no empty shell.

use tessera_core::analyze::{AnalysisReport, AnalysisSink, ContentAnalyzer};
use tessera_core::{AppError, ContentItem, ItemRef};

/// Minimum words before an item is considered substantive.
const MIN_BODY_WORDS: usize = 50;

/// Structural content checks; each finding costs one step of score.
pub struct StructuralAnalyzer;

impl ContentAnalyzer for StructuralAnalyzer {
    async fn analyze(
        &self,
        item: &ItemRef,
        content: &ContentItem,
    ) -> Result<AnalysisReport, AppError> {
        let mut findings = Vec::new();

        let word_count = content.body.split_whitespace().count();
        if content.body.trim().is_empty() {
            findings.push("Body is empty; the item adds nothing to the store".to_string());
        } else if word_count < MIN_BODY_WORDS {
            findings.push(format!(
                "Body has only {} words (minimum {} for useful retrieval)",
                word_count, MIN_BODY_WORDS
            ));
        }

        if content.title.trim().is_empty() {
            findings.push("Title is empty".to_string());
        } else if content.title.chars().count() > 120 {
            findings.push("Title exceeds 120 characters".to_string());
        }

        if !content.body.trim().is_empty()
            && content.body.trim().eq_ignore_ascii_case(content.title.trim())
        {
            findings.push("Body merely repeats the title".to_string());
        }

        let score = 100u8.saturating_sub((findings.len() as u8).saturating_mul(30));
        Ok(AnalysisReport {
            item_id: item.id,
            score,
            findings,
            analyzed_at: chrono::Utc::now(),
        })
    }
}

/// Sink that reports through structured logging.
pub struct TracingReportSink;

impl AnalysisSink for TracingReportSink {
    async fn store_report(&self, report: &AnalysisReport) -> Result<(), AppError> {
        if report.findings.is_empty() {
            tracing::info!(item_id = report.item_id, score = report.score, "analysis: ok");
        } else {
            tracing::warn!(
                item_id = report.item_id,
                score = report.score,
                findings = report.findings.join("; "),
                "analysis: needs attention"
            );
        }
        Ok(())
    }
}
