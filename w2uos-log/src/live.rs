use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use w2uos_clock::Clock;
use w2uos_service::{Service, ServiceId, ServiceState};

use crate::logger::{LiveSettings, LogDispatch, LoggerBuilder, PreStartPolicy, RecordFactory};
use crate::sink::{lock, SinkSet};
use crate::types::{LogColor, LogLevel, LogRecord};

/// Logger that hands records to a background task through a bounded queue.
///
/// Producers suspend (or block, from OS threads) while the queue is full;
/// nothing is dropped and the queue never grows past its capacity. The
/// worker owns the sinks while running and returns them when it has drained
/// the queue, so `stop()` completes only after every record accepted before
/// it was called has been written.
pub struct LiveLogger {
    id: ServiceId,
    factory: RecordFactory,
    capacity: usize,
    pre_start: PreStartPolicy,
    state: Mutex<ServiceState>,
    started: AtomicBool,
    sender: RwLock<Option<mpsc::Sender<LogRecord>>>,
    idle_sinks: Mutex<Option<SinkSet>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<SinkSet>>>,
}

impl LiveLogger {
    /// Console-only live logger with the default queue capacity.
    pub fn new(clock: Arc<dyn Clock>, level_console: LogLevel) -> Self {
        let (factory, sinks, settings) = LoggerBuilder::new(clock).console(level_console).into_parts();
        Self::from_parts(factory, sinks, settings)
    }

    pub fn builder(clock: Arc<dyn Clock>) -> LoggerBuilder {
        LoggerBuilder::new(clock)
    }

    pub(crate) fn from_parts(factory: RecordFactory, sinks: SinkSet, settings: LiveSettings) -> Self {
        Self {
            id: settings.id,
            factory,
            capacity: settings.capacity,
            pre_start: settings.pre_start,
            state: Mutex::new(ServiceState::Stopped),
            started: AtomicBool::new(false),
            sender: RwLock::new(None),
            idle_sinks: Mutex::new(Some(sinks)),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServiceState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records waiting in the queue right now.
    pub fn queued(&self) -> usize {
        self.current_sender()
            .map(|sender| self.capacity - sender.capacity())
            .unwrap_or(0)
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.factory.is_enabled(level)
    }

    /// Spawns the queue worker. No-op unless the logger is stopped.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!(logger = %self.id, state = %self.state(), "live logger already started");
            return Ok(());
        }

        let mut idle = lock(&self.idle_sinks);
        let sinks = idle
            .take()
            .ok_or_else(|| anyhow!("log sinks were lost by a crashed worker"))?;
        let (tx, rx) = mpsc::channel(self.capacity);
        *worker = Some(tokio::task::spawn_blocking(move || drain(rx, sinks)));
        *self.sender.write().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        self.started.store(true, Ordering::Release);
        *lock(&self.state) = ServiceState::Running;
        drop(idle);

        info!(logger = %self.id, capacity = self.capacity, "live logger started");
        Ok(())
    }

    /// Stops accepting records, waits for the worker to drain the queue,
    /// then returns to `Stopped`. Safe to call repeatedly.
    pub async fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.take() else {
            return Ok(());
        };

        *lock(&self.state) = ServiceState::Stopping;
        info!(logger = %self.id, queued = self.queued(), "live logger stopping");
        self.sender.write().unwrap_or_else(|e| e.into_inner()).take();

        let outcome = handle.await;
        let result = match outcome {
            Ok(sinks) => {
                *lock(&self.idle_sinks) = Some(sinks);
                Ok(())
            }
            Err(err) => {
                error!(logger = %self.id, ?err, "log worker terminated abnormally");
                Err(anyhow!("log worker terminated abnormally: {err}"))
            }
        };
        *lock(&self.state) = ServiceState::Stopped;
        info!(logger = %self.id, "live logger stopped");
        result
    }

    /// Queues a record, waiting for space while the queue is full.
    pub async fn log(&self, level: LogLevel, component: &str, message: impl Into<String>, color: LogColor) {
        if !self.is_enabled(level) {
            return;
        }
        if let Some(sender) = self.current_sender() {
            let record = self.factory.record(level, component, message.into(), color);
            if sender.send(record).await.is_err() {
                debug!(logger = %self.id, "log queue closed while sending");
            }
            return;
        }
        if let Some(record) = self.write_before_start(level, component, message.into(), color) {
            // start() raced with this call; the worker owns the sinks now
            if let Some(sender) = self.current_sender() {
                if sender.send(record).await.is_err() {
                    debug!(logger = %self.id, "log queue closed while sending");
                }
            }
        }
    }

    /// Blocking counterpart of [`log`](Self::log) for producer threads.
    ///
    /// Returns once the record is in the queue. Outside the runtime this
    /// parks the thread on the queue. On a multi-thread runtime the wait
    /// happens in `block_in_place`. On a current-thread runtime a full queue
    /// is waited on from a scoped helper thread; the worker drains on its own
    /// blocking thread, so parking the runtime thread cannot starve it.
    pub fn log_blocking(&self, level: LogLevel, component: &str, message: impl Into<String>, color: LogColor) {
        if !self.is_enabled(level) {
            return;
        }
        let record = match self.current_sender() {
            Some(sender) => {
                let record = self.factory.record(level, component, message.into(), color);
                Some((sender, record))
            }
            None => self
                .write_before_start(level, component, message.into(), color)
                .and_then(|record| self.current_sender().map(|sender| (sender, record))),
        };
        if let Some((sender, record)) = record {
            if !send_blocking(sender, record) {
                debug!(logger = %self.id, "log queue closed while sending");
            }
        }
    }

    fn current_sender(&self) -> Option<mpsc::Sender<LogRecord>> {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Handles a call made while no queue is open. Returns the record when
    /// the sinks have meanwhile moved to a worker.
    fn write_before_start(&self, level: LogLevel, component: &str, message: String, color: LogColor) -> Option<LogRecord> {
        if self.started.load(Ordering::Acquire) || self.pre_start == PreStartPolicy::Discard {
            return None;
        }
        let mut idle = lock(&self.idle_sinks);
        let record = self.factory.record(level, component, message, color);
        match idle.as_mut() {
            Some(sinks) if !self.started.load(Ordering::Acquire) => {
                sinks.dispatch(&record);
                None
            }
            _ => Some(record),
        }
    }
}

/// Returns false when the queue closed before the record was accepted.
fn send_blocking(sender: mpsc::Sender<LogRecord>, record: LogRecord) -> bool {
    match Handle::try_current() {
        Err(_) => sender.blocking_send(record).is_ok(),
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(sender.send(record)).is_ok())
        }
        Ok(_) => match sender.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            Err(TrySendError::Full(record)) => std::thread::scope(|scope| {
                scope
                    .spawn(move || sender.blocking_send(record).is_ok())
                    .join()
                    .unwrap_or(false)
            }),
        },
    }
}

/// Worker body. Runs on a blocking thread so slow sinks never hold up a
/// runtime thread that producers need to be woken on.
fn drain(mut receiver: mpsc::Receiver<LogRecord>, mut sinks: SinkSet) -> SinkSet {
    debug!(sinks = sinks.len(), "log worker running");
    while let Some(record) = receiver.blocking_recv() {
        sinks.dispatch(&record);
    }
    sinks.flush();
    debug!("log worker drained");
    sinks
}

#[async_trait::async_trait]
impl LogDispatch for LiveLogger {
    fn is_enabled(&self, level: LogLevel) -> bool {
        LiveLogger::is_enabled(self, level)
    }

    async fn dispatch(&self, level: LogLevel, component: &str, message: String, color: LogColor) {
        self.log(level, component, message, color).await;
    }

    fn dispatch_blocking(&self, level: LogLevel, component: &str, message: String, color: LogColor) {
        self.log_blocking(level, component, message, color);
    }
}

#[async_trait::async_trait]
impl Service for LiveLogger {
    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn state(&self) -> ServiceState {
        LiveLogger::state(self)
    }

    async fn start(&self) -> Result<()> {
        LiveLogger::start(self).await
    }

    async fn stop(&self) -> Result<()> {
        LiveLogger::stop(self).await
    }

    async fn health_check(&self) -> Result<()> {
        let guard = self.worker.lock().await;
        if let Some(handle) = guard.as_ref() {
            if handle.is_finished() {
                anyhow::bail!("log worker finished unexpectedly");
            }
            Ok(())
        } else {
            anyhow::bail!("live logger not started")
        }
    }
}
