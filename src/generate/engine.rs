/// Batched generation engine
///
/// One engine drives one run: Idle -> Running -> Completed | Aborted | Failed.
/// The range is planned into batches, batches run on a bounded rayon pool,
/// and every unit inside a batch is decoded, named, skipped if its file
/// exists, or rendered and written.
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbImage};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::naming::OutputLayout;
use super::planner::{self, BatchDescriptor};
use super::progress::{ProgressCallback, ProgressSnapshot, ProgressTracker, UnitOutcome};
use crate::backend::{self, ComputeBackend};
use crate::color::RgbColor;
use crate::error::{GeneratorError, Result};
use crate::memory;
use crate::state::options::{EngineOptions, FailurePolicy, MandalaSeed};
use crate::state::request::GenerationRequest;

/// Suffix of the scratch file an image is encoded into before it is renamed
const PARTIAL_SUFFIX: &str = "part";

/// Lifecycle of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Aborted,
    Failed,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Stop was requested; files written so far are kept
    Aborted,
    /// Unrecoverable error; `reason` is the error message verbatim
    Failed { reason: String },
}

/// Final report of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    /// Counters at the moment the run ended
    pub progress: ProgressSnapshot,
    pub started_at: DateTime<Local>,
    /// Indices per batch after memory scaling (0 if the run failed before planning)
    pub batch_size: u64,
}

/// Read-only context shared by all workers of a run
struct RunContext<'a> {
    request: &'a GenerationRequest,
    layout: OutputLayout,
    backend: Box<dyn ComputeBackend>,
    tracker: ProgressTracker,
    halt: CancellationToken,
}

pub struct GenerationEngine {
    options: EngineOptions,
    cancel: CancellationToken,
    state: Mutex<EngineState>,
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl GenerationEngine {
    /// Fresh engine with its own stop token
    pub fn new(options: EngineOptions) -> Self {
        Self::with_cancellation(options, CancellationToken::new())
    }

    /// Engine observing an externally owned stop token
    pub fn with_cancellation(options: EngineOptions, cancel: CancellationToken) -> Self {
        Self {
            options,
            cancel,
            state: Mutex::new(EngineState::Idle),
        }
    }

    /// Token that stops this engine when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a cooperative stop: in-flight writes finish, nothing new starts
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Run one generation to a terminal state
    ///
    /// Invalid requests or options return `Err` and leave the engine Idle. Once the run
    /// starts, failures are reported as `RunStatus::Failed` in the summary.
    pub fn run(&self, request: &GenerationRequest, progress: Option<ProgressCallback>) -> Result<RunSummary> {
        self.run_on(backend::select_backend(self.options.backend), request, progress)
    }

    fn run_on(
        &self,
        backend: Box<dyn ComputeBackend>,
        request: &GenerationRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Idle {
                return Err(GeneratorError::EngineSpent);
            }
            request.validate()?;
            self.options.validate()?;
            *state = EngineState::Running;
        }

        let started_at = Local::now();
        let total = request.total_images();

        tracing::info!(
            output = %request.output_root.display(),
            start = request.start,
            end = request.end,
            pattern = request.pattern.folder_name(),
            size = %request.size.folder_name(),
            total,
            backend = backend.name(),
            "🎨 Starting generation"
        );

        let ctx = RunContext {
            request,
            layout: request.output_layout(),
            backend,
            tracker: ProgressTracker::new(total, progress),
            halt: self.cancel.child_token(),
        };

        let (batch_size, outcome) = match self.prepare(&ctx) {
            Ok((batch_size, jobs)) => (batch_size, self.execute(&ctx, &jobs)),
            Err(e) => (0, Err(e)),
        };

        let status = match outcome {
            Err(e) => RunStatus::Failed { reason: e.to_string() },
            Ok(()) if self.cancel.is_cancelled() => RunStatus::Aborted,
            Ok(()) => RunStatus::Completed,
        };
        let summary = RunSummary {
            status,
            progress: ctx.tracker.snapshot(),
            started_at,
            batch_size,
        };
        self.finish(&summary);
        Ok(summary)
    }

    /// Create the output tree and plan the work units
    fn prepare(&self, ctx: &RunContext<'_>) -> Result<(u64, Vec<(Option<u8>, BatchDescriptor)>)> {
        for dir in ctx.layout.directories() {
            fs::create_dir_all(&dir).map_err(|source| GeneratorError::CreateDir { path: dir, source })?;
        }

        let budget = memory::estimate(ctx.backend.as_ref());
        let batch_size = budget.batch_size(self.options.base_batch_size);
        let batches = planner::plan(ctx.request.start, ctx.request.end, batch_size)?;

        let jobs: Vec<(Option<u8>, BatchDescriptor)> = ctx
            .request
            .layout
            .buckets()
            .into_iter()
            .flat_map(|bucket| batches.iter().map(move |batch| (bucket, *batch)))
            .collect();

        tracing::info!(batch_size, jobs = jobs.len(), "📦 Planned batches");
        Ok((batch_size, jobs))
    }

    /// Run every job on the worker pool; the first fatal error halts the rest
    fn execute(&self, ctx: &RunContext<'_>, jobs: &[(Option<u8>, BatchDescriptor)]) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count())
            .thread_name(|i| format!("rgb-worker-{}", i))
            .build()?;

        let first_error: Mutex<Option<GeneratorError>> = Mutex::new(None);

        pool.install(|| {
            jobs.par_iter().for_each(|(bucket, batch)| {
                if ctx.halt.is_cancelled() {
                    return;
                }
                if let Err(e) = self.process_batch(ctx, *bucket, batch) {
                    tracing::error!(batch = batch.batch_index, error = %e, "Batch failed, halting run");
                    first_error.lock().get_or_insert(e);
                    ctx.halt.cancel();
                }
            });
        });

        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Process one batch in ascending index order
    ///
    /// The backend's batch memory is released whether the batch finishes,
    /// stops early or fails.
    fn process_batch(&self, ctx: &RunContext<'_>, bucket: Option<u8>, batch: &BatchDescriptor) -> Result<()> {
        let colors = ctx.backend.decode_range(batch.start_idx, batch.end_idx);
        let result = self.process_units(ctx, bucket, batch, colors);
        ctx.backend.release_batch();

        if result.is_ok() {
            tracing::debug!(
                batch = batch.batch_index,
                bucket = ?bucket,
                start = batch.start_idx,
                end = batch.end_idx,
                "Batch done"
            );
        }
        result
    }

    fn process_units(
        &self,
        ctx: &RunContext<'_>,
        bucket: Option<u8>,
        batch: &BatchDescriptor,
        colors: Vec<RgbColor>,
    ) -> Result<()> {
        for (offset, color) in colors.into_iter().enumerate() {
            if ctx.halt.is_cancelled() {
                break;
            }

            let path = ctx.layout.path_for(color, bucket);
            if path.exists() {
                ctx.tracker.record(UnitOutcome::Skipped);
                continue;
            }

            let index = batch.start_idx + offset as u32;
            let image = self.render_unit(ctx.request, color, index, bucket);
            match write_png(&image, &path) {
                Ok(()) => ctx.tracker.record(UnitOutcome::Generated),
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::SkipAndContinue => {
                        tracing::warn!(error = %e, "Skipping unit after write failure");
                        ctx.tracker.record(UnitOutcome::Failed);
                    }
                },
            }
        }
        Ok(())
    }

    /// Render the image for one unit
    ///
    /// Inside a gray bucket the fill is the color's luminance triple.
    fn render_unit(&self, request: &GenerationRequest, color: RgbColor, index: u32, bucket: Option<u8>) -> RgbImage {
        let fill = match bucket {
            Some(_) => RgbColor::gray(color.luminance()),
            None => color,
        };

        match self.options.mandala_seed {
            MandalaSeed::PerIndex => {
                let seed = index as u64 | (bucket.unwrap_or(0) as u64) << 24;
                request.pattern.render(request.size, fill, &mut ChaCha8Rng::seed_from_u64(seed))
            }
            MandalaSeed::Random => request.pattern.render(request.size, fill, &mut rand::thread_rng()),
        }
    }

    fn finish(&self, summary: &RunSummary) {
        let state = match summary.status {
            RunStatus::Completed => EngineState::Completed,
            RunStatus::Aborted => EngineState::Aborted,
            RunStatus::Failed { .. } => EngineState::Failed,
        };
        *self.state.lock() = state;

        let p = &summary.progress;
        match &summary.status {
            RunStatus::Completed => tracing::info!(
                generated = p.images_generated,
                skipped = p.images_skipped,
                failed = p.images_failed,
                elapsed_s = p.elapsed_seconds,
                "✅ Generation complete"
            ),
            RunStatus::Aborted => tracing::info!(
                generated = p.images_generated,
                skipped = p.images_skipped,
                "⏹️  Generation stopped"
            ),
            RunStatus::Failed { reason } => tracing::error!(
                generated = p.images_generated,
                skipped = p.images_skipped,
                %reason,
                "❌ Generation failed"
            ),
        }
    }
}

/// Encode to a scratch file next to `path`, then rename it into place
///
/// The final path only ever holds a complete PNG, so the skip-on-exists
/// check can trust it on the next run.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<()> {
    let partial = partial_path(path);

    if let Err(source) = image.save_with_format(&partial, ImageFormat::Png) {
        let _ = fs::remove_file(&partial);
        return Err(GeneratorError::Encode { path: path.to_path_buf(), source });
    }
    if let Err(source) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(GeneratorError::Write { path: path.to_path_buf(), source });
    }
    Ok(())
}

/// `RRGGBB.png` -> `RRGGBB.png.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScalarBackend;
    use crate::generate::naming::Layout;
    use crate::generate::pattern::{ImageSize, Pattern};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Scalar decoding that counts batch decodes and releases
    #[derive(Default)]
    struct CountingBackend {
        decoded: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl ComputeBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn decode_range(&self, start: u32, end: u32) -> Vec<RgbColor> {
            self.decoded.fetch_add(1, Ordering::SeqCst);
            ScalarBackend.decode_range(start, end)
        }

        fn release_batch(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request(root: &Path, start: u32, end: u32) -> GenerationRequest {
        GenerationRequest {
            output_root: root.to_path_buf(),
            start,
            end,
            size: ImageSize::new(1, 1),
            pattern: Pattern::Single,
            layout: Layout::Canonical,
        }
    }

    fn small_batches(workers: usize) -> EngineOptions {
        EngineOptions {
            workers,
            base_batch_size: 4,
            ..EngineOptions::default()
        }
    }

    fn png_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_two_color_scenario() {
        let dir = TempDir::new().unwrap();
        let engine = GenerationEngine::new(EngineOptions::default());
        assert!(!engine.state().is_terminal());

        let before = Local::now();
        let summary = engine.run(&request(dir.path(), 0, 1), None).unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(engine.state(), EngineState::Completed);
        assert!(engine.state().is_terminal());
        assert!(summary.started_at >= before && summary.started_at <= Local::now());
        assert_eq!(summary.progress.images_generated, 2);

        let out = dir.path().join("RGB_Colors").join("Single").join("1x1");
        assert_eq!(png_files(&out), vec!["000000.png", "010000.png"]);

        let img = image::open(out.join("010000.png")).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1, 1));
        assert_eq!(img.get_pixel(0, 0).0, [1, 0, 0]);
    }

    #[test]
    fn test_rerun_skips_everything() {
        let dir = TempDir::new().unwrap();
        let req = request(dir.path(), 250, 270);

        let first = GenerationEngine::new(small_batches(3)).run(&req, None).unwrap();
        assert_eq!(first.progress.images_generated, 21);

        let second = GenerationEngine::new(small_batches(3)).run(&req, None).unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(second.progress.images_generated, 0);
        assert_eq!(second.progress.images_skipped, 21);

        let out = dir.path().join("RGB_Colors").join("Single").join("1x1");
        assert_eq!(png_files(&out).len(), 21);
    }

    #[test]
    fn test_snapshots_are_monotonic() {
        let dir = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |snap: ProgressSnapshot| sink.lock().push(snap));

        let summary = GenerationEngine::new(small_batches(4))
            .run(&request(dir.path(), 0, 99), Some(callback))
            .unwrap();
        assert_eq!(summary.status, RunStatus::Completed);

        let seen = seen.lock();
        assert_eq!(seen.len(), 100);
        for pair in seen.windows(2) {
            assert!(pair[1].images_generated >= pair[0].images_generated);
            assert!(pair[1].images_skipped >= pair[0].images_skipped);
        }
        assert!(seen.iter().all(|s| s.processed() <= s.total_images));
    }

    #[test]
    fn test_stop_mid_run_aborts() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(GenerationEngine::new(small_batches(1)));
        let token = engine.cancellation_token();
        let callback: ProgressCallback = Arc::new(move |snap: ProgressSnapshot| {
            if snap.processed() == 3 {
                token.cancel();
            }
        });

        let summary = engine.run(&request(dir.path(), 0, 49), Some(callback)).unwrap();
        assert_eq!(summary.status, RunStatus::Aborted);
        assert_eq!(engine.state(), EngineState::Aborted);
        assert_eq!(summary.progress.processed(), 3);
        assert!(summary.progress.processed() < summary.progress.total_images);

        // Everything written is a complete, decodable PNG and no scratch files remain
        let out = dir.path().join("RGB_Colors").join("Single").join("1x1");
        let files = png_files(&out);
        assert_eq!(files.len(), 3);
        for name in files {
            assert!(name.ends_with(".png"));
            assert!(image::open(out.join(&name)).is_ok());
        }
    }

    #[test]
    fn test_invalid_request_stays_idle() {
        let dir = TempDir::new().unwrap();
        let engine = GenerationEngine::new(EngineOptions::default());
        let err = engine.run(&request(dir.path(), 9, 3), None).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidRange(_)));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_engine_is_single_use() {
        let dir = TempDir::new().unwrap();
        let engine = GenerationEngine::new(EngineOptions::default());
        engine.run(&request(dir.path(), 0, 0), None).unwrap();
        assert!(matches!(
            engine.run(&request(dir.path(), 0, 0), None),
            Err(GeneratorError::EngineSpent)
        ));
    }

    fn block_unit(dir: &Path) {
        // A directory where the scratch file should go makes the encode fail
        let out = dir.join("RGB_Colors").join("Single").join("1x1");
        fs::create_dir_all(out.join("020000.png.part")).unwrap();
    }

    #[test]
    fn test_write_failure_is_fatal_by_default() {
        let dir = TempDir::new().unwrap();
        block_unit(dir.path());

        let engine = GenerationEngine::new(small_batches(1));
        let summary = engine.run(&request(dir.path(), 0, 5), None).unwrap();
        match &summary.status {
            RunStatus::Failed { reason } => assert!(reason.contains("020000.png")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(engine.state(), EngineState::Failed);
        assert_eq!(summary.progress.images_generated, 2);
    }

    #[test]
    fn test_failed_batch_is_released() {
        let dir = TempDir::new().unwrap();
        block_unit(dir.path());

        let backend = CountingBackend::default();
        let decoded = backend.decoded.clone();
        let released = backend.released.clone();

        let engine = GenerationEngine::new(small_batches(1));
        let summary = engine
            .run_on(Box::new(backend), &request(dir.path(), 0, 5), None)
            .unwrap();
        assert!(matches!(summary.status, RunStatus::Failed { .. }));
        assert!(decoded.load(Ordering::SeqCst) >= 1);
        assert_eq!(released.load(Ordering::SeqCst), decoded.load(Ordering::SeqCst));
    }

    #[test]
    fn test_every_batch_is_released() {
        let dir = TempDir::new().unwrap();
        let backend = CountingBackend::default();
        let decoded = backend.decoded.clone();
        let released = backend.released.clone();

        let summary = GenerationEngine::new(small_batches(2))
            .run_on(Box::new(backend), &request(dir.path(), 0, 39), None)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(released.load(Ordering::SeqCst), decoded.load(Ordering::SeqCst));
        assert_eq!(decoded.load(Ordering::SeqCst) as u64, 40u64.div_ceil(summary.batch_size));
    }

    #[test]
    fn test_invalid_batch_size_stays_idle() {
        let dir = TempDir::new().unwrap();
        for base_batch_size in [0, u64::MAX / 2] {
            let engine = GenerationEngine::new(EngineOptions {
                base_batch_size,
                ..EngineOptions::default()
            });
            let err = engine.run(&request(dir.path(), 0, 3), None).unwrap_err();
            assert!(matches!(err, GeneratorError::InvalidRange(_)));
            assert_eq!(engine.state(), EngineState::Idle);
        }
        // Nothing was created before the rejection
        assert!(!dir.path().join("RGB_Colors").exists());
    }

    #[test]
    fn test_largest_batch_size_runs() {
        let dir = TempDir::new().unwrap();
        let options = EngineOptions {
            base_batch_size: crate::color::COLOR_COUNT,
            ..EngineOptions::default()
        };
        let summary = GenerationEngine::new(options)
            .run(&request(dir.path(), 0, 3), None)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.progress.images_generated, 4);
        assert!(summary.batch_size >= crate::color::COLOR_COUNT);
    }

    #[test]
    fn test_write_failure_can_be_skipped() {
        let dir = TempDir::new().unwrap();
        block_unit(dir.path());

        let options = EngineOptions {
            failure_policy: FailurePolicy::SkipAndContinue,
            ..small_batches(2)
        };
        let summary = GenerationEngine::new(options)
            .run(&request(dir.path(), 0, 5), None)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.progress.images_generated, 5);
        assert_eq!(summary.progress.images_failed, 1);
    }

    #[test]
    fn test_unwritable_root_fails() {
        let dir = TempDir::new().unwrap();
        let file_root = dir.path().join("not-a-dir");
        fs::write(&file_root, b"x").unwrap();

        let summary = GenerationEngine::new(EngineOptions::default())
            .run(&request(&file_root, 0, 1), None)
            .unwrap();
        assert!(matches!(summary.status, RunStatus::Failed { .. }));
        assert_eq!(summary.batch_size, 0);
    }

    #[test]
    fn test_grayscale_bucket_layout() {
        let dir = TempDir::new().unwrap();
        let mut req = request(dir.path(), 255, 256);
        req.layout = Layout::GrayscaleBuckets { gray_start: 1, gray_end: 2 };

        let summary = GenerationEngine::new(EngineOptions::default()).run(&req, None).unwrap();
        assert_eq!(summary.progress.images_generated, 4);

        // (255, 0, 0) has luminance 76 = 0x4C; (0, 1, 0) has luminance 0
        assert_eq!(
            png_files(&dir.path().join("01")),
            vec!["01-000100-000000.png", "01-FF0000-4C4C4C.png"]
        );
        let img = image::open(dir.path().join("02").join("02-FF0000-4C4C4C.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [76, 76, 76]);
    }

    #[test]
    fn test_mandala_per_index_is_reproducible() {
        let options = EngineOptions {
            mandala_seed: MandalaSeed::PerIndex,
            ..EngineOptions::default()
        };
        let mut bytes = Vec::new();
        for _ in 0..2 {
            let dir = TempDir::new().unwrap();
            let mut req = request(dir.path(), 1000, 1000);
            req.size = ImageSize::new(12, 8);
            req.pattern = Pattern::Mandala { colors_per_image: 4 };
            GenerationEngine::new(options).run(&req, None).unwrap();

            let path = dir.path().join("RGB_Colors/Mandala/12x8/E80300.png");
            bytes.push(image::open(path).unwrap().to_rgb8().into_raw());
        }
        assert_eq!(bytes[0], bytes[1]);
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/a/000000.png")),
            PathBuf::from("/a/000000.png.part")
        );
    }
}
