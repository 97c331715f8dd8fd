use crate::config::{GeneticsConfig, RenderConfig};
use crate::data::ArtifactStore;
use crate::engines::generation::fractal::{lock_fractal, SharedFractal};
use crate::engines::generation::POPULATION_SIZE;
use crate::engines::rendering::cancel::CancelToken;
use crate::engines::rendering::readiness::ReadinessTable;
use crate::engines::rendering::renderer::{RenderRequest, Renderer};
use crate::error::{AestheticError, Result};
use crate::types::ArtifactState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Notified whenever a slot's image changes, so the presentation layer can redraw
pub trait Repaint: Send + Sync {
    fn request_repaint(&self);
}

impl<F> Repaint for F
where
    F: Fn() + Send + Sync,
{
    fn request_repaint(&self) {
        self()
    }
}

/// For headless use
pub struct NoRepaint;

impl Repaint for NoRepaint {
    fn request_repaint(&self) {}
}

/// Progress of render jobs, sent from the job threads
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Started {
        slot: usize,
        identity: String,
    },
    Ready {
        slot: usize,
        identity: String,
        attempts: u32,
        regenerations: u32,
    },
    Failed {
        slot: usize,
        identity: String,
        reason: String,
    },
    Cancelled {
        slot: usize,
    },
}

impl RenderEvent {
    pub fn slot(&self) -> usize {
        match self {
            RenderEvent::Started { slot, .. }
            | RenderEvent::Ready { slot, .. }
            | RenderEvent::Failed { slot, .. }
            | RenderEvent::Cancelled { slot } => *slot,
        }
    }

    /// True for the last event a job sends
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RenderEvent::Started { .. })
    }
}

/// Render counts for one successful job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct JobStats {
    attempts: u32,
    regenerations: u32,
}

struct RenderJob {
    slot: usize,
    fractal: SharedFractal,
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// State shared by every job thread
struct JobContext {
    renderer: Arc<dyn Renderer>,
    store: ArtifactStore,
    render: RenderConfig,
    genetics: GeneticsConfig,
    readiness: Arc<ReadinessTable>,
    events: Sender<RenderEvent>,
    repaint: Arc<dyn Repaint>,
}

/// Runs one render job per fractal on its own thread and filters sparse
/// images by mutating or regenerating the fractal until it renders densely.
pub struct RenderScheduler {
    context: Arc<JobContext>,
    jobs: Vec<RenderJob>,
    events_rx: Receiver<RenderEvent>,
    rng: StdRng,
}

impl RenderScheduler {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        store: ArtifactStore,
        render: RenderConfig,
        genetics: GeneticsConfig,
        seed: Option<u64>,
    ) -> Self {
        let (events_tx, events_rx) = channel();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            context: Arc::new(JobContext {
                renderer,
                store,
                render,
                genetics,
                readiness: Arc::new(ReadinessTable::new(POPULATION_SIZE)),
                events: events_tx,
                repaint: Arc::new(NoRepaint),
            }),
            jobs: Vec::new(),
            events_rx,
            rng,
        }
    }

    /// Must be set before the first job is started
    pub fn with_repaint(mut self, repaint: Arc<dyn Repaint>) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.repaint = repaint;
        }
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.context.store
    }

    pub fn readiness(&self) -> Arc<ReadinessTable> {
        Arc::clone(&self.context.readiness)
    }

    pub fn is_ready(&self, slot: usize) -> bool {
        self.context.readiness.is_ready(slot)
    }

    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.events_rx
    }

    /// Next pending event, if any (non-blocking)
    pub fn poll_event(&self) -> Option<RenderEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Jobs started and not yet joined, finished or not
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Starts jobs for every slot that still needs an image. A slot whose
    /// job cannot be started is logged and skipped; the rest still render.
    /// Returns the number of jobs started.
    pub fn render_all(&mut self, fractals: &[SharedFractal]) -> usize {
        let mut started = 0;
        for (slot, fractal) in fractals.iter().enumerate() {
            let state = lock_fractal(fractal).state();
            match state {
                ArtifactState::Pending | ArtifactState::Discarded => {
                    match self.render_slot(slot, fractal) {
                        Ok(()) => started += 1,
                        Err(e) => log::error!("Could not start render of slot {}: {}", slot, e),
                    }
                }
                ArtifactState::Ready => self.context.readiness.mark(slot, true),
                ArtifactState::Rendering | ArtifactState::Failed => {}
            }
        }
        started
    }

    /// Starts a job for one slot unless it is already rendering or ready.
    /// A failed fractal is retried.
    pub fn render_slot(&mut self, slot: usize, fractal: &SharedFractal) -> Result<()> {
        self.reap_finished();

        {
            let mut guard = lock_fractal(fractal);
            match guard.state() {
                ArtifactState::Rendering => return Ok(()),
                ArtifactState::Ready => {
                    self.context.readiness.mark(slot, true);
                    return Ok(());
                }
                _ => {}
            }
            guard.set_state(ArtifactState::Rendering);
        }
        self.context.readiness.mark(slot, false);

        let cancel = CancelToken::new();
        let context = Arc::clone(&self.context);
        let job_fractal = Arc::clone(fractal);
        let job_cancel = cancel.clone();
        let job_rng = StdRng::seed_from_u64(self.rng.gen());

        let spawned = thread::Builder::new()
            .name(format!("render-{}", slot))
            .spawn(move || run_job(&context, slot, &job_fractal, &job_cancel, job_rng));

        match spawned {
            Ok(handle) => {
                self.jobs.push(RenderJob {
                    slot,
                    fractal: Arc::clone(fractal),
                    cancel,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                lock_fractal(fractal).set_state(ArtifactState::Pending);
                Err(AestheticError::Io(e))
            }
        }
    }

    /// Stops every job and waits for them to exit. Fractals left mid-render
    /// go back to `Pending` and the readiness table is cleared.
    pub fn cancel_all(&mut self) {
        let jobs: Vec<RenderJob> = self.jobs.drain(..).collect();
        for job in &jobs {
            job.cancel.cancel();
        }

        let cancelled = jobs.len();
        for job in jobs {
            if job.handle.join().is_err() {
                log::error!("Render job for slot {} panicked", job.slot);
            }
            let mut fractal = lock_fractal(&job.fractal);
            if fractal.state() == ArtifactState::Rendering {
                fractal.discard(&self.context.store);
                fractal.set_state(ArtifactState::Pending);
            }
        }

        self.context.readiness.clear();
        if cancelled > 0 {
            log::debug!("Cancelled {} render job(s)", cancelled);
        }
    }

    /// Blocks until every started job has finished on its own
    pub fn wait_all(&mut self) {
        for job in self.jobs.drain(..) {
            if job.handle.join().is_err() {
                log::error!("Render job for slot {} panicked", job.slot);
            }
        }
    }

    fn reap_finished(&mut self) {
        let (finished, running): (Vec<RenderJob>, Vec<RenderJob>) = self
            .jobs
            .drain(..)
            .partition(|job| job.handle.is_finished());
        self.jobs = running;
        for job in finished {
            if job.handle.join().is_err() {
                log::error!("Render job for slot {} panicked", job.slot);
            }
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn run_job(
    ctx: &JobContext,
    slot: usize,
    fractal: &SharedFractal,
    cancel: &CancelToken,
    mut rng: StdRng,
) {
    let identity = lock_fractal(fractal).id().to_string();
    let _ = ctx.events.send(RenderEvent::Started {
        slot,
        identity: identity.clone(),
    });

    let outcome = render_until_dense(ctx, fractal, cancel, &mut rng).and_then(|stats| {
        let mut guard = lock_fractal(fractal);
        // Checked under the lock so cancel_all never sees a half-applied result
        cancel.check()?;
        guard.load_image(&ctx.store)?;
        Ok((guard.id().to_string(), stats))
    });

    match outcome {
        Ok((identity, stats)) => {
            ctx.readiness.mark(slot, true);
            log::info!(
                "Slot {} ready: {} after {} render(s), {} regeneration(s)",
                slot,
                identity,
                stats.attempts,
                stats.regenerations
            );
            let _ = ctx.events.send(RenderEvent::Ready {
                slot,
                identity,
                attempts: stats.attempts,
                regenerations: stats.regenerations,
            });
            ctx.repaint.request_repaint();
        }
        Err(AestheticError::Cancelled) => {
            log::debug!("Render of slot {} cancelled", slot);
            let _ = ctx.events.send(RenderEvent::Cancelled { slot });
        }
        // Failures racing a cancellation leave the slot to cancel_all
        Err(e) if cancel.is_cancelled() => {
            log::debug!("Render of slot {} cancelled after: {}", slot, e);
            let _ = ctx.events.send(RenderEvent::Cancelled { slot });
        }
        Err(e) => {
            let identity = {
                let mut guard = lock_fractal(fractal);
                ctx.store.discard(guard.id());
                guard.set_state(ArtifactState::Failed);
                guard.id().to_string()
            };
            log::error!("Render of slot {} ({}) failed: {}", slot, identity, e);
            let _ = ctx.events.send(RenderEvent::Failed {
                slot,
                identity,
                reason: e.to_string(),
            });
            ctx.repaint.request_repaint();
        }
    }
}

/// Renders until the artifact is dense. Each round tries the current genes
/// plus up to `max_sparse_retries` in-place mutations; a sparse round ends
/// with a redo from lineage. After `max_regenerations` redos the last image
/// is accepted as is.
fn render_until_dense(
    ctx: &JobContext,
    fractal: &SharedFractal,
    cancel: &CancelToken,
    rng: &mut StdRng,
) -> Result<JobStats> {
    let threshold = ctx.render.sparse_threshold_bytes();
    let mut stats = JobStats::default();
    ctx.store.ensure_dir()?;

    loop {
        for retry in 0..=ctx.render.max_sparse_retries {
            cancel.check()?;
            if retry > 0 {
                let mut guard = lock_fractal(fractal);
                guard.discard(&ctx.store);
                guard.in_place_mutate(&ctx.genetics, rng);
                guard.set_state(ArtifactState::Rendering);
            }

            let request = request_for(ctx, fractal);
            render_with_retries(ctx, &request, cancel)?;
            stats.attempts += 1;

            if !lock_fractal(fractal).is_sparse_image(&ctx.store, threshold)? {
                return Ok(stats);
            }
            log::debug!(
                "{} is sparse, retry {}/{}",
                request.identity,
                retry,
                ctx.render.max_sparse_retries
            );
        }

        cancel.check()?;
        if stats.regenerations >= ctx.render.max_regenerations {
            let identity = lock_fractal(fractal).id().to_string();
            log::warn!(
                "Accepting sparse image {} after {} regeneration(s)",
                identity,
                stats.regenerations
            );
            return Ok(stats);
        }

        let mut guard = lock_fractal(fractal);
        guard.discard(&ctx.store);
        guard.redo(&ctx.genetics, rng);
        guard.set_state(ArtifactState::Rendering);
        stats.regenerations += 1;
    }
}

fn request_for(ctx: &JobContext, fractal: &SharedFractal) -> RenderRequest {
    let guard = lock_fractal(fractal);
    let identity = guard.id().to_string();
    RenderRequest {
        stem: ctx.store.stem_for(&identity),
        output: ctx.store.path_for(&identity),
        arguments: guard.renderer_arguments(),
        identity,
    }
}

/// One render, retried up to `io_retries` more times on renderer failures
fn render_with_retries(ctx: &JobContext, request: &RenderRequest, cancel: &CancelToken) -> Result<()> {
    let attempts = ctx.render.io_retries + 1;
    let mut last_error = None;

    for attempt in 1..=attempts {
        cancel.check()?;
        let result = ctx.renderer.render(request, cancel).and_then(|()| {
            if request.output.exists() {
                Ok(())
            } else {
                Err(AestheticError::RendererIo(format!(
                    "Renderer produced no output at {}",
                    request.output.display()
                )))
            }
        });

        match result {
            Ok(()) => return Ok(()),
            Err(AestheticError::Cancelled) => return Err(AestheticError::Cancelled),
            Err(e) => {
                log::warn!(
                    "Render attempt {}/{} for {} failed: {}",
                    attempt,
                    attempts,
                    request.identity,
                    e
                );
                ctx.store.discard(&request.identity);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AestheticError::RendererIo("Renderer was never invoked".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::fractal::Fractal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Writes a fixed-size file for every request
    struct FixedSizeRenderer {
        bytes: usize,
        calls: AtomicU32,
    }

    impl Renderer for FixedSizeRenderer {
        fn render(&self, request: &RenderRequest, _cancel: &CancelToken) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&request.output, vec![0u8; self.bytes])?;
            Ok(())
        }
    }

    /// Fails every call until cancelled, then reports an I/O error
    struct FailingRenderer {
        calls: AtomicU32,
        hold_until_cancelled: bool,
    }

    impl Renderer for FailingRenderer {
        fn render(&self, _request: &RenderRequest, cancel: &CancelToken) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while self.hold_until_cancelled && !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err(AestheticError::RendererIo("renderer exited with 1".to_string()))
        }
    }

    fn scheduler(dir: &std::path::Path, renderer: Arc<dyn Renderer>) -> RenderScheduler {
        scheduler_with(dir, renderer, RenderConfig::default().io_retries)
    }

    fn scheduler_with(dir: &std::path::Path, renderer: Arc<dyn Renderer>, io_retries: u32) -> RenderScheduler {
        let render = RenderConfig {
            image_dir: dir.to_path_buf(),
            sparse_threshold_kb: 1,
            max_sparse_retries: 2,
            max_regenerations: 1,
            io_retries,
            ..RenderConfig::default()
        };
        RenderScheduler::new(
            renderer,
            ArtifactStore::from_config(&render),
            render,
            GeneticsConfig::default(),
            Some(5),
        )
    }

    fn wait_terminal(scheduler: &RenderScheduler) -> RenderEvent {
        loop {
            let event = scheduler
                .events()
                .recv_timeout(Duration::from_secs(10))
                .unwrap();
            if event.is_terminal() {
                return event;
            }
        }
    }

    #[test]
    fn test_dense_render_is_ready_first_try() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FixedSizeRenderer {
            bytes: 4096,
            calls: AtomicU32::new(0),
        });
        let mut scheduler = scheduler(dir.path(), renderer.clone());
        let mut rng = StdRng::seed_from_u64(1);
        let fractal = Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared();

        scheduler.render_slot(0, &fractal).unwrap();
        match wait_terminal(&scheduler) {
            RenderEvent::Ready { attempts, regenerations, .. } => {
                assert_eq!(attempts, 1);
                assert_eq!(regenerations, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        scheduler.wait_all();

        let guard = lock_fractal(&fractal);
        assert_eq!(guard.state(), ArtifactState::Ready);
        assert_eq!(guard.image().unwrap().len(), 4096);
        assert!(!scheduler.store().path_for(guard.id()).exists());
        assert!(scheduler.is_ready(0));
    }

    #[test]
    fn test_always_sparse_accepts_last_image() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FixedSizeRenderer {
            bytes: 10,
            calls: AtomicU32::new(0),
        });
        let mut scheduler = scheduler(dir.path(), renderer.clone());
        let mut rng = StdRng::seed_from_u64(2);
        let fractal = Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared();

        scheduler.render_slot(3, &fractal).unwrap();
        match wait_terminal(&scheduler) {
            RenderEvent::Ready { slot, attempts, regenerations, .. } => {
                assert_eq!(slot, 3);
                // (max_sparse_retries + 1) renders per round, two rounds
                assert_eq!(attempts, 6);
                assert_eq!(regenerations, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        scheduler.wait_all();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 6);
        assert_eq!(lock_fractal(&fractal).state(), ArtifactState::Ready);
    }

    #[test]
    fn test_ready_fractal_is_not_rerendered() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FixedSizeRenderer {
            bytes: 4096,
            calls: AtomicU32::new(0),
        });
        let mut scheduler = scheduler(dir.path(), renderer.clone());
        let mut rng = StdRng::seed_from_u64(3);
        let fractal = Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared();

        assert_eq!(scheduler.render_all(std::slice::from_ref(&fractal)), 1);
        wait_terminal(&scheduler);
        scheduler.wait_all();
        assert_eq!(scheduler.render_all(std::slice::from_ref(&fractal)), 0);
        assert_eq!(scheduler.job_count(), 0);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_io_retries_count_extra_attempts() {
        for (io_retries, expected_calls) in [(0, 1), (2, 3)] {
            let dir = tempfile::tempdir().unwrap();
            let renderer = Arc::new(FailingRenderer {
                calls: AtomicU32::new(0),
                hold_until_cancelled: false,
            });
            let mut scheduler = scheduler_with(dir.path(), renderer.clone(), io_retries);
            let mut rng = StdRng::seed_from_u64(4);
            let fractal = Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared();

            scheduler.render_slot(0, &fractal).unwrap();
            assert!(matches!(wait_terminal(&scheduler), RenderEvent::Failed { .. }));
            scheduler.wait_all();
            assert_eq!(renderer.calls.load(Ordering::SeqCst), expected_calls);
            assert_eq!(lock_fractal(&fractal).state(), ArtifactState::Failed);
        }
    }

    #[test]
    fn test_failure_during_cancel_resets_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FailingRenderer {
            calls: AtomicU32::new(0),
            hold_until_cancelled: true,
        });
        // No retries, so the I/O error is what the job ends with
        let mut scheduler = scheduler_with(dir.path(), renderer.clone(), 0);
        let mut rng = StdRng::seed_from_u64(6);
        let fractal = Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared();

        scheduler.render_slot(2, &fractal).unwrap();
        while renderer.calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(2));
        }
        scheduler.cancel_all();

        assert_eq!(lock_fractal(&fractal).state(), ArtifactState::Pending);
        let events: Vec<RenderEvent> = std::iter::from_fn(|| scheduler.poll_event()).collect();
        assert!(events.contains(&RenderEvent::Cancelled { slot: 2 }));
        assert!(!events.iter().any(|e| matches!(e, RenderEvent::Failed { .. })));
    }

    #[test]
    fn test_unusable_image_dir_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let renderer = Arc::new(FixedSizeRenderer {
            bytes: 4096,
            calls: AtomicU32::new(0),
        });
        let mut scheduler = scheduler(&blocker.join("images"), renderer.clone());
        let mut rng = StdRng::seed_from_u64(7);
        let fractals: Vec<SharedFractal> = (0..2)
            .map(|_| Fractal::random(&GeneticsConfig::default(), &mut rng).into_shared())
            .collect();

        assert_eq!(scheduler.render_all(&fractals), 2);
        for _ in 0..2 {
            assert!(matches!(wait_terminal(&scheduler), RenderEvent::Failed { .. }));
        }
        scheduler.wait_all();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        for fractal in &fractals {
            assert_eq!(lock_fractal(fractal).state(), ArtifactState::Failed);
        }
    }
}
