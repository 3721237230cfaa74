mod shutdown;

use std::{sync::Arc, thread::JoinHandle};

pub use shutdown::Shutdown;

use crate::{
    config::{ConfigError, PipelineConfig},
    display::SharedSink,
    serial::{line_channel, ByteIntake},
    storage::{PersistentStore, SharedStore},
    utils::{auxiliary::spawn_worker, pipeline_error::PipelineError},
    workers::{record_channel, CaptureError, CaptureWorker, PlaybackWorker, StatusIndicators},
};

const CAPTURE_WORKER: &str = "capture";
const PLAYBACK_WORKER: &str = "playback";

/// Everything the pipeline is made of, wired together but not running. Built once at startup;
/// the byte intake goes to the serial receive handler and the workers to their threads.
pub struct Pipeline<S> {
    config: PipelineConfig,
    intake: ByteIntake,
    capture: CaptureWorker<SharedStore<S>>,
    playback: PlaybackWorker<S>,
    store: SharedStore<S>,
    status: Arc<StatusIndicators>,
    shutdown: Shutdown,
}

/// The pieces of a [Pipeline], for callers that drive the workers themselves.
pub struct PipelineParts<S> {
    pub intake: ByteIntake,
    pub capture: CaptureWorker<SharedStore<S>>,
    pub playback: PlaybackWorker<S>,
    pub store: SharedStore<S>,
    pub status: Arc<StatusIndicators>,
    pub shutdown: Shutdown,
}

/// A pipeline whose workers are running on their own threads.
pub struct RunningPipeline<S> {
    intake: Option<ByteIntake>,
    capture: JoinHandle<Result<(), CaptureError>>,
    playback: JoinHandle<()>,
    store: SharedStore<S>,
    status: Arc<StatusIndicators>,
    shutdown: Shutdown,
}

impl<S: PersistentStore> Pipeline<S> {
    /// Creates the channels, signal, cursor and workers of a pipeline.
    ///
    /// # Arguments
    ///
    /// - `config`: The pipeline settings, validated here.
    /// - `store`: The persistent store lines are written to.
    /// - `sink`: Where lines are shown and errors reported, shared by both workers.
    ///
    /// # Returns
    ///
    /// The new `Pipeline`, or a `PipelineError::Config` if the settings are invalid or the store
    /// cannot hold a single maximum length line.
    pub fn new(config: PipelineConfig, store: S, sink: SharedSink) -> Result<Self, PipelineError> {
        config.validate()?;
        if (store.capacity() as usize) < config.max_stored_line_len() {
            return Err(ConfigError::StoreTooSmall {
                capacity: store.capacity(),
                needed: config.max_stored_line_len(),
            }
            .into());
        }

        let (intake, source) = line_channel(&config);
        let status = Arc::new(StatusIndicators::new(intake.stats()));
        let shutdown = Shutdown::new(source.notifier());
        let store = SharedStore::new(store);
        let (sender, receiver) = record_channel(config.record_channel_capacity);

        let capture = CaptureWorker::new(
            source,
            store.clone(),
            sender,
            sink.clone(),
            status.clone(),
            shutdown.clone(),
            &config,
        );
        let playback = PlaybackWorker::new(receiver, store.reader(), sink, status.clone(), &config);

        Ok(Self {
            config,
            intake,
            capture,
            playback,
            store,
            status,
            shutdown,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn status(&self) -> Arc<StatusIndicators> {
        self.status.clone()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn into_parts(self) -> PipelineParts<S> {
        PipelineParts {
            intake: self.intake,
            capture: self.capture,
            playback: self.playback,
            store: self.store,
            status: self.status,
            shutdown: self.shutdown,
        }
    }
}

impl<S: PersistentStore + Send + 'static> Pipeline<S> {
    /// Starts the capture and playback workers on threads with the configured priorities.
    pub fn spawn(self) -> Result<RunningPipeline<S>, PipelineError> {
        let priorities = self.config.priorities;
        let capture = self.capture;
        let capture = spawn_worker(CAPTURE_WORKER, priorities.capture, move || capture.run())
            .map_err(|source| PipelineError::Spawn {
                worker: CAPTURE_WORKER,
                source,
            })?;

        let playback = self.playback;
        let spawned = spawn_worker(PLAYBACK_WORKER, priorities.playback, move || playback.run());
        let playback = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                self.shutdown.request();
                let _ = capture.join();
                return Err(PipelineError::Spawn {
                    worker: PLAYBACK_WORKER,
                    source,
                });
            }
        };
        log::info!("pipeline running");

        Ok(RunningPipeline {
            intake: Some(self.intake),
            capture,
            playback,
            store: self.store,
            status: self.status,
            shutdown: self.shutdown,
        })
    }
}

impl<S> RunningPipeline<S> {
    /// Hands out the byte intake, once, to whoever receives the serial bytes.
    pub fn take_intake(&mut self) -> Option<ByteIntake> {
        self.intake.take()
    }

    pub fn status(&self) -> Arc<StatusIndicators> {
        self.status.clone()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    /// Requests shutdown and waits for both workers. Lines signalled before the request are
    /// still stored and played.
    pub fn shutdown(self) -> Result<(), PipelineError> {
        self.shutdown.request();
        self.join()
    }

    /// Waits for both workers to end without requesting it.
    pub fn join(self) -> Result<(), PipelineError> {
        let captured = self.capture.join();
        // The capture worker dropped its record sender, so playback ends after the last record.
        let played = self.playback.join();
        log::info!("pipeline stopped");

        match captured {
            Err(_) => {
                return Err(PipelineError::WorkerPanicked {
                    worker: CAPTURE_WORKER,
                })
            }
            Ok(result) => result?,
        }
        played.map_err(|_| PipelineError::WorkerPanicked {
            worker: PLAYBACK_WORKER,
        })
    }
}
