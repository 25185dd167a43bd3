/// Headless job runner
///
/// Runs one JSON job file without the window, logging progress at a fixed
/// interval. Ctrl-C requests a cooperative stop.
use parking_lot::Mutex;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rgb_generator::generate::inventory;
use rgb_generator::generate::{
    format_duration, GenerationEngine, ProgressCallback, ProgressSnapshot, RunStatus,
};
use rgb_generator::state::settings::GeneratorConfig;

/// Minimum time between two progress log lines
const LOG_INTERVAL: Duration = Duration::from_secs(5);

pub fn run_job(path: &Path, inventory_only: bool) -> Result<(), Box<dyn Error>> {
    let config = GeneratorConfig::load(path)?;
    config.request.validate()?;
    config.options.validate()?;

    if inventory_only {
        let existing = inventory::count_existing(&config.request);
        println!(
            "{} of {} images already on disk",
            existing,
            config.request.total_images()
        );
        return Ok(());
    }

    let engine = Arc::new(GenerationEngine::new(config.options));
    let request = config.request;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let summary = runtime.block_on(async {
        let token = engine.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Stop requested, finishing in-flight images");
                token.cancel();
            }
        });

        let engine = engine.clone();
        tokio::task::spawn_blocking(move || engine.run(&request, Some(progress_logger())))
            .await
    })??;

    let p = &summary.progress;
    println!(
        "Run started {}: generated {} / skipped {} / failed {} of {} in {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        p.images_generated,
        p.images_skipped,
        p.images_failed,
        p.total_images,
        format_duration(p.elapsed_seconds)
    );

    match summary.status {
        RunStatus::Completed | RunStatus::Aborted => Ok(()),
        RunStatus::Failed { reason } => Err(reason.into()),
    }
}

/// Progress observer that logs at most once per `LOG_INTERVAL`
fn progress_logger() -> ProgressCallback {
    let last_log = Mutex::new(Instant::now());
    Arc::new(move |snap: ProgressSnapshot| {
        let Some(mut last) = last_log.try_lock() else {
            return;
        };
        if last.elapsed() < LOG_INTERVAL && snap.processed() < snap.total_images {
            return;
        }
        *last = Instant::now();

        tracing::info!(
            generated = snap.images_generated,
            skipped = snap.images_skipped,
            total = snap.total_images,
            per_second = snap.images_per_second,
            remaining = %snap
                .estimated_remaining_seconds
                .map(format_duration)
                .unwrap_or_else(|| "unknown".to_string()),
            "⏳ {:.1}%",
            snap.percent()
        );
    })
}
