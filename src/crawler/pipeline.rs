//! Pipeline assembly
//!
//! Picks the renderer, the handler and the seeds for a pipeline, runs its
//! coordinator inside a `pipeline` span and writes the dataset.

use crate::config::{PipelineKind, PipelineSettings};
use crate::crawler::coordinator::{Coordinator, CrawlContext};
use crate::crawler::handler::{
    CatalogHandler, CountHandler, DetailsHandler, PageHandler, ProductsHandler,
};
use crate::crawler::light::LightFetch;
use crate::crawler::rendered::RenderedFetch;
use crate::crawler::renderer::PageRenderer;
use crate::crawler::request::FetchStrategy;
use crate::output::{load_links, write_records, CrawlStatistics};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

/// What a finished pipeline produced
#[derive(Debug)]
pub struct PipelineReport {
    pub kind: PipelineKind,
    /// Dataset path, None when no records were collected
    pub output: Option<PathBuf>,
    pub stats: CrawlStatistics,
}

/// Builds the renderer for `strategy`
///
/// A rendered strategy launches its browser here; the caller must call
/// [`PageRenderer::shutdown`] once the crawl ends.
pub async fn build_renderer(
    ctx: &CrawlContext,
    strategy: FetchStrategy,
) -> Result<Arc<dyn PageRenderer>> {
    let config = &ctx.config;
    match strategy {
        FetchStrategy::Light => Ok(Arc::new(LightFetch::new(config.light.clone())?)),
        FetchStrategy::Rendered => {
            let renderer = RenderedFetch::launch(
                config.rendered.clone(),
                config.light.accept.clone(),
                config.light.accept_language.clone(),
                config.light.referer.clone(),
                ctx.profile.ready_marker_group(),
            )
            .await?;
            Ok(Arc::new(renderer))
        }
    }
}

/// Resolves a configured file name against the output directory
///
/// Absolute paths are kept as they are.
pub fn output_path(ctx: &CrawlContext, name: &str) -> PathBuf {
    Path::new(&ctx.config.output.directory).join(name)
}

/// Start URLs for a pipeline: configured URLs, or the links file of the details pass
fn seeds(ctx: &CrawlContext, settings: &PipelineSettings) -> Result<Vec<Url>> {
    let mut urls = settings
        .start_urls
        .iter()
        .map(|s| Url::parse(s))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(links_file) = &settings.links_file {
        let path = output_path(ctx, links_file);
        for entry in load_links(&path)? {
            match Url::parse(&entry.link) {
                Ok(url) => urls.push(url),
                Err(e) => tracing::warn!("Skipping invalid link '{}': {}", entry.link, e),
            }
        }
    }

    Ok(urls)
}

/// Runs one pipeline end to end and writes its dataset
///
/// # Errors
///
/// Only setup (seed loading, renderer construction) and the final write can
/// fail; per-URL failures just reduce the records collected.
pub async fn run_pipeline(ctx: &CrawlContext, kind: PipelineKind) -> Result<PipelineReport> {
    let span = tracing::info_span!("pipeline", name = kind.name());
    async move {
        let settings = ctx.config.pipeline(kind);
        let seeds = seeds(ctx, &settings)?;
        tracing::info!(
            "Running {} pipeline ({} fetch, {} seed URL(s), up to {} concurrent fetches)",
            kind.name(),
            settings.strategy,
            seeds.len(),
            settings.max_concurrent_fetches
        );

        let renderer = build_renderer(ctx, settings.strategy).await?;
        let profile = ctx.profile.clone();

        match kind {
            PipelineKind::Products => {
                execute(ctx, kind, ProductsHandler::new(profile), renderer, &settings, seeds).await
            }
            PipelineKind::Catalog => {
                execute(ctx, kind, CatalogHandler::new(profile), renderer, &settings, seeds).await
            }
            PipelineKind::Count => {
                execute(ctx, kind, CountHandler::new(profile), renderer, &settings, seeds).await
            }
            PipelineKind::Details => {
                execute(ctx, kind, DetailsHandler::new(profile), renderer, &settings, seeds).await
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute<H: PageHandler>(
    ctx: &CrawlContext,
    kind: PipelineKind,
    handler: H,
    renderer: Arc<dyn PageRenderer>,
    settings: &PipelineSettings,
    seeds: Vec<Url>,
) -> Result<PipelineReport> {
    let coordinator = Coordinator::new(ctx, handler, renderer.clone(), settings);
    let run = coordinator.run(seeds).await;
    renderer.shutdown().await;

    let path = output_path(ctx, &settings.output);
    let written = write_records(&path, &run.records)?;

    Ok(PipelineReport {
        kind,
        output: written.then_some(path),
        stats: run.stats,
    })
}
