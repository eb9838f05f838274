//! Preview-then-upgrade texture pipeline.
//!
//! A request installs a low-resolution preview immediately, then queues a
//! full-resolution job. One worker task runs jobs strictly one at a time and
//! yields to the runtime between row chunks, so the render loop sharing the
//! runtime never waits on a whole raster.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::SurfaceError;
use crate::{SurfaceGenerator, SurfaceRaster, SurfaceRequest};

/// Caller-chosen identifier of whatever displays a texture (a planet view).
pub type ViewId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Preview,
    Full,
}

/// Rendering side of the pipeline: uploads rasters and frees them again.
/// Called outside the scheduler's lock, from the worker task or the caller.
pub trait TextureHost: Send + Sync + 'static {
    fn install(&self, view: ViewId, stage: Stage, raster: &Arc<SurfaceRaster>);
    fn release(&self, view: ViewId, raster: &Arc<SurfaceRaster>);
}

type JobResult = Result<Arc<SurfaceRaster>, SurfaceError>;

struct Job {
    view: ViewId,
    request: SurfaceRequest,
    chunk_rows: usize,
    cancelled: Arc<AtomicBool>,
    reply: oneshot::Sender<JobResult>,
}

impl Job {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.reply.send(Err(SurfaceError::Cancelled));
    }
}

struct Installed {
    stage: Stage,
    raster: Arc<SurfaceRaster>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    running: Option<(ViewId, Arc<AtomicBool>)>,
    installed: HashMap<ViewId, Installed>,
}

struct Shared {
    generator: Arc<SurfaceGenerator>,
    host: Arc<dyn TextureHost>,
    state: Mutex<State>,
    wake: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves to the full-resolution raster once its job finishes.
/// Resolves to [`SurfaceError::Cancelled`] if the view went away first.
pub struct UpgradeHandle {
    rx: oneshot::Receiver<JobResult>,
}

impl Future for UpgradeHandle {
    type Output = JobResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(SurfaceError::Cancelled)))
    }
}

pub struct GenerationScheduler {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl GenerationScheduler {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(generator: Arc<SurfaceGenerator>, host: Arc<dyn TextureHost>) -> Self {
        let shared = Arc::new(Shared {
            generator,
            host,
            state: Mutex::new(State::default()),
            wake: Notify::new(),
        });
        let worker = tokio::spawn(run(shared.clone()));
        Self { shared, worker }
    }

    /// Install a preview for `view` now and queue its full-resolution upgrade.
    /// Supersedes any job still queued or running for the same view.
    pub fn request(
        &self,
        view: ViewId,
        request: SurfaceRequest,
        chunk_rows: usize,
    ) -> Result<UpgradeHandle, SurfaceError> {
        let generator = &self.shared.generator;
        generator.check_resolution(request.resolution)?;
        let preview_resolution = generator.config().preview_resolution.min(request.resolution);
        let preview = generator.generate_surface(&request.at_resolution(preview_resolution))?;

        let (superseded, replaced) = {
            let mut state = self.shared.state();
            let superseded = take_jobs(&mut state, view);
            let replaced = state.installed.insert(
                view,
                Installed {
                    stage: Stage::Preview,
                    raster: preview.clone(),
                },
            );
            (superseded, replaced)
        };
        for job in superseded {
            job.cancel();
        }
        let host = &self.shared.host;
        host.install(view, Stage::Preview, &preview);
        if let Some(old) = replaced.filter(|old| !Arc::ptr_eq(&old.raster, &preview)) {
            host.release(view, &old.raster);
        }

        // The preview is visible before the upgrade can be picked up.
        let (reply, rx) = oneshot::channel();
        self.shared.state().queue.push_back(Job {
            view,
            request,
            chunk_rows: chunk_rows.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
            reply,
        });
        self.shared.wake.notify_one();
        Ok(UpgradeHandle { rx })
    }

    /// Forget `view`: drop its queued jobs, stop its running job at the next
    /// chunk boundary and release its texture. Repeat calls do nothing.
    pub fn cancel_view(&self, view: ViewId) {
        let (dropped, released) = {
            let mut state = self.shared.state();
            let dropped = take_jobs(&mut state, view);
            (dropped, state.installed.remove(&view))
        };
        for job in dropped {
            job.cancel();
        }
        if let Some(installed) = released {
            self.shared.host.release(view, &installed.raster);
        }
    }

    pub fn active_texture(&self, view: ViewId) -> Option<(Stage, Arc<SurfaceRaster>)> {
        self.shared
            .state()
            .installed
            .get(&view)
            .map(|i| (i.stage, i.raster.clone()))
    }

    pub fn queued_jobs(&self) -> usize {
        self.shared.state().queue.len()
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        // Queued replies are dropped with the task; their handles resolve Cancelled.
        self.worker.abort();
    }
}

/// Pull every queued job of `view` and flag its running one, if any.
fn take_jobs(state: &mut State, view: ViewId) -> Vec<Job> {
    if let Some((running, flag)) = &state.running {
        if *running == view {
            flag.store(true, Ordering::Release);
        }
    }
    let (taken, kept): (Vec<Job>, Vec<Job>) = state.queue.drain(..).partition(|j| j.view == view);
    state.queue = kept.into();
    taken
}

async fn run(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.state();
            let job = state.queue.pop_front();
            if let Some(job) = &job {
                state.running = Some((job.view, job.cancelled.clone()));
            }
            job
        };
        let Some(job) = next else {
            shared.wake.notified().await;
            continue;
        };

        let result = shared
            .generator
            .upgrade(&job.request, job.chunk_rows, &job.cancelled)
            .await;
        finish(&shared, job, result);
    }
}

fn finish(shared: &Shared, job: Job, result: JobResult) {
    let swapped = {
        let mut state = shared.state();
        state.running = None;
        match &result {
            Ok(raster) if !job.cancelled.load(Ordering::Acquire) => {
                state.installed.get_mut(&job.view).map(|slot| {
                    let preview = std::mem::replace(
                        slot,
                        Installed {
                            stage: Stage::Full,
                            raster: raster.clone(),
                        },
                    );
                    (raster.clone(), preview.raster)
                })
            }
            _ => None,
        }
    };

    let result = match result {
        Ok(_) if job.cancelled.load(Ordering::Acquire) => Err(SurfaceError::Cancelled),
        other => other,
    };

    if let Some((full, preview)) = swapped {
        shared.host.install(job.view, Stage::Full, &full);
        if !Arc::ptr_eq(&full, &preview) {
            shared.host.release(job.view, &preview);
        }
        info!(
            view = job.view,
            resolution = full.width,
            planet_type = %full.planet_type,
            "installed full surface"
        );
    }
    let _ = job.reply.send(result);
}
