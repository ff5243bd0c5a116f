//! Bulk content analysis as a second instantiation of the job runner.
//!
//! The scoring itself lives behind [`ContentAnalyzer`]; this module only
//! wires an analyzer and a report sink into a [`UnitProcessor`] so analysis
//! jobs get the same single-stepping, retry, and circuit-breaker behavior
//! as sync jobs.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::job::ItemRef;
use crate::registry::{ContentItem, ContentSource};
use crate::runner::UnitProcessor;

/// Result of analyzing one content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub item_id: i64,
    /// Overall quality score in `[0, 100]`.
    pub score: u8,
    /// Human-readable findings, one per line of advice.
    pub findings: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Scores one content item. The heuristics are supplied by the host
/// application; the engine only runs them per item under job control.
pub trait ContentAnalyzer: Send + Sync {
    fn analyze(
        &self,
        item: &ItemRef,
        content: &ContentItem,
    ) -> impl Future<Output = Result<AnalysisReport, AppError>> + Send;
}

/// Persists analysis reports.
pub trait AnalysisSink: Send + Sync {
    fn store_report(
        &self,
        report: &AnalysisReport,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// The unit of work for analysis jobs: fetch content, score it, persist
/// the report. An item that vanished since job creation is skipped.
pub struct AnalysisProcessor<S, Z, K> {
    source: S,
    analyzer: Z,
    sink: K,
}

impl<S, Z, K> AnalysisProcessor<S, Z, K>
where
    S: ContentSource,
    Z: ContentAnalyzer,
    K: AnalysisSink,
{
    pub fn new(source: S, analyzer: Z, sink: K) -> Self {
        Self {
            source,
            analyzer,
            sink,
        }
    }
}

impl<S, Z, K> UnitProcessor for AnalysisProcessor<S, Z, K>
where
    S: ContentSource,
    Z: ContentAnalyzer,
    K: AnalysisSink,
{
    fn job_type(&self) -> &str {
        "analysis"
    }

    async fn process(&self, item: &ItemRef) -> Result<(), AppError> {
        let Some(content) = self.source.fetch_item(item).await? else {
            tracing::debug!(item_id = item.id, "item vanished before analysis, skipping");
            return Ok(());
        };
        let report = self.analyzer.analyze(item, &content).await?;
        self.sink.store_report(&report).await?;
        tracing::debug!(item_id = item.id, score = report.score, "item analyzed");
        Ok(())
    }
}
