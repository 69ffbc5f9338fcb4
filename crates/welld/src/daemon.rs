//! Wiring: workers, the scheduler thread and its collaborators.

use crate::config::Config;
use crate::shutdown::{Shutdown, ShutdownClock};
use crate::vision::Vision;
use crate::worker::{Worker, WorkerError};
use std::sync::Arc;
use std::thread::JoinHandle;
use well_core::{CaptureScheduler, Collaborators, QualityGate};
use well_hw::{ActivityTracker, PointerSource, SystemProbe, WebcamSource};
use well_models::ModelPaths;
use well_store::{IdentityFile, SqliteStore};

/// Worker handles the scheduler talks to.
pub struct Workers {
    pub vision: Worker<Vision>,
    pub store: Worker<SqliteStore>,
}

impl Workers {
    /// Start the vision and store threads, failing fast on missing models
    /// or an unopenable database.
    pub fn start(config: &Config) -> Result<Self, WorkerError> {
        let timeout = config.call_timeout();

        let models = ModelPaths::in_dir(&config.model_dir);
        for path in models.missing() {
            tracing::error!(path = %path.display(), "model file missing");
        }
        let camera = WebcamSource::new(config.camera_device.clone(), config.warmup_frames);
        let vision = Worker::spawn("vision", timeout, move || Vision::load(camera, &models))?;

        let db_path = config.db_path.clone();
        let store = Worker::spawn("store", timeout, move || SqliteStore::open(&db_path))?;
        tracing::info!(db = %config.db_path.display(), "store worker ready");

        Ok(Self { vision, store })
    }
}

#[cfg(feature = "pointer")]
fn pointer() -> impl PointerSource {
    well_hw::EnigoPointer::new()
}

#[cfg(not(feature = "pointer"))]
fn pointer() -> impl PointerSource {
    tracing::info!("built without pointer support; user presence is assumed");
    well_hw::NoPointer
}

/// Run the capture loop on its own thread until shutdown is requested.
pub fn spawn_scheduler(
    config: &Config,
    workers: Workers,
    shutdown: Arc<Shutdown>,
    on_exit: impl FnOnce() + Send + 'static,
) -> std::io::Result<JoinHandle<()>> {
    let scheduler_config = config.scheduler();
    let gate = QualityGate::new(config.quality());
    let identity_file = IdentityFile::new(config.identity_file.clone());
    let idle_timeout = config.idle_timeout();

    std::thread::Builder::new()
        .name("well-scheduler".into())
        .spawn(move || {
            // The pointer backend may hold thread-bound display handles.
            let probe = SystemProbe::new(ActivityTracker::new(pointer(), idle_timeout));
            let collab = Collaborators {
                camera: workers.vision.clone(),
                analyzer: workers.vision,
                probe,
                store: workers.store.clone(),
                cache: identity_file,
                sink: workers.store,
            };
            let clock = ShutdownClock::new(Arc::clone(&shutdown));
            let mut scheduler = CaptureScheduler::new(scheduler_config, gate, collab, clock);
            scheduler.run(|| shutdown.is_requested());
            on_exit();
        })
}
