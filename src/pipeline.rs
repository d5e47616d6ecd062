use std::io;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::CompletionProvider;
use crate::models::{GenerationRequest, GenerationResult, ProductRecord};
use crate::prompt;
use crate::report::{ReportWriter, slugify};
use crate::shopify::CatalogClient;
use crate::shopify::catalog::MAX_PAGE_LIMIT;
use crate::shopify::category::{filter_by_category, resolve_grouping_field};

/// Fixed output name for the per-product run; the category run derives its
/// name from the slugified category.
pub const PRODUCTS_OUTPUT: &str = "sample_output.txt";

/// Courtesy delay between items so the generation provider's rate limits are
/// respected. Injectable so tests run with zero delay.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    delay: Duration,
}

impl Pacing {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn none() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to write report: {0}")]
    Report(#[source] io::Error),
    #[error("failed to read category input: {0}")]
    Input(#[source] io::Error),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub generated: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunStats),
    /// Empty fetch or empty category match; an informational exit, not a
    /// crash.
    NothingToDo,
}

pub struct Pipeline<P> {
    catalog: CatalogClient,
    provider: P,
    pacing: Pacing,
}

impl<P: CompletionProvider> Pipeline<P> {
    pub fn new(catalog: CatalogClient, provider: P, pacing: Pacing) -> Self {
        Self {
            catalog,
            provider,
            pacing,
        }
    }

    /// Per-product pipeline: fetch the catalog, then one post per record.
    pub async fn run_products(&self, limit: u32) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let started = Utc::now();

        let records = self.catalog.fetch_products(limit).await;
        if records.is_empty() {
            info!(target = "calliope.pipeline", "no products fetched, nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }
        info!(
            target = "calliope.pipeline",
            run_id = %run_id.simple(),
            products = records.len(),
            "generating product posts",
        );

        let mut writer = ReportWriter::create(PRODUCTS_OUTPUT).map_err(PipelineError::Report)?;
        let stats = generate_posts(&records, &self.provider, &mut writer, &self.pacing).await?;
        let blocks = writer.blocks();
        let output = writer.path().display().to_string();
        writer.finish().map_err(PipelineError::Report)?;

        info!(
            target = "calliope.pipeline",
            run_id = %run_id.simple(),
            started = %started,
            generated = stats.generated,
            failed = stats.failed,
            blocks,
            output = %output,
            "run complete",
        );
        Ok(RunOutcome::Completed(stats))
    }

    /// Per-category pipeline: probe the grouping attribute on a small fetch,
    /// ask for the category, filter a full fetch, then one post for the set.
    /// `ask` receives the resolved attribute name and returns the operator's
    /// category choice.
    pub async fn run_category<F>(
        &self,
        probe_limit: u32,
        ask: F,
    ) -> Result<RunOutcome, PipelineError>
    where
        F: FnOnce(&str) -> io::Result<String>,
    {
        let run_id = Uuid::new_v4();
        let started = Utc::now();

        let probe = self.catalog.fetch_products_detailed(probe_limit).await;
        if probe.is_empty() {
            info!(target = "calliope.pipeline", "no products fetched, nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }
        log_catalog_overview(&probe);

        let field = resolve_grouping_field(&probe);
        let category = ask(field.name()).map_err(PipelineError::Input)?;
        let category = category.trim().to_string();
        if category.is_empty() {
            info!(target = "calliope.pipeline", "empty category input, nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }

        let pool = self.catalog.fetch_products_detailed(MAX_PAGE_LIMIT).await;
        let matches = filter_by_category(&pool, field, &category);
        if matches.is_empty() {
            info!(
                target = "calliope.pipeline",
                category = %category,
                "no products matched the category, nothing to do",
            );
            return Ok(RunOutcome::NothingToDo);
        }
        info!(
            target = "calliope.pipeline",
            run_id = %run_id.simple(),
            category = %category,
            matched = matches.len(),
            "generating category post",
        );

        let output = format!("{}-blog-post.md", slugify(&category));
        let mut writer = ReportWriter::create(&output).map_err(PipelineError::Report)?;
        let request = prompt::category_post(&category, &matches);
        let result = complete_one(&self.provider, request).await;
        let stats = record_result(&result);
        writer.write_result(&result).map_err(PipelineError::Report)?;
        writer.finish().map_err(PipelineError::Report)?;

        info!(
            target = "calliope.pipeline",
            run_id = %run_id.simple(),
            started = %started,
            generated = stats.generated,
            failed = stats.failed,
            output = %output,
            "run complete",
        );
        Ok(RunOutcome::Completed(stats))
    }
}

/// The sequential loop shared by tests and the product run. Every record in
/// produces exactly one written block, in input order; a generation failure
/// marks the item and the loop continues.
pub async fn generate_posts<P: CompletionProvider>(
    records: &[ProductRecord],
    provider: &P,
    writer: &mut ReportWriter,
    pacing: &Pacing,
) -> Result<RunStats, PipelineError> {
    let mut stats = RunStats::default();
    for (index, record) in records.iter().enumerate() {
        let request = prompt::product_post(record);
        let result = complete_one(provider, request).await;
        writer.write_result(&result).map_err(PipelineError::Report)?;
        let item = record_result(&result);
        stats.generated += item.generated;
        stats.failed += item.failed;
        if index + 1 < records.len() {
            pacing.pause().await;
        }
    }
    Ok(stats)
}

async fn complete_one<P: CompletionProvider>(
    provider: &P,
    request: GenerationRequest,
) -> GenerationResult {
    let started = Instant::now();
    let outcome = provider.complete(&request).await;
    crate::metrics::generation_elapsed(&request.subject, started.elapsed().as_millis());
    match outcome {
        Some(text) => GenerationResult::success(request.subject, text),
        None => GenerationResult::failure(request.subject, "provider returned no completion"),
    }
}

fn record_result(result: &GenerationResult) -> RunStats {
    if result.text.is_some() {
        info!(
            target = "calliope.pipeline",
            subject = %result.subject,
            "blog post generated",
        );
        RunStats {
            generated: 1,
            failed: 0,
        }
    } else {
        warn!(
            target = "calliope.pipeline",
            subject = %result.subject,
            reason = result.failure_reason.as_deref().unwrap_or("unknown"),
            "blog post generation failed",
        );
        RunStats {
            generated: 0,
            failed: 1,
        }
    }
}

fn log_catalog_overview(records: &[ProductRecord]) {
    for record in records {
        info!(
            target = "calliope.pipeline",
            product = %record.title,
            product_type = record.product_type.as_deref().unwrap_or("-"),
            metafields = record.metafields.len(),
            variants = record.variants.len(),
            images = record.images.len(),
            "catalog entry",
        );
    }
}
