use crate::types::{AppError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Create a bounded queue
///
/// A capacity of zero is raised to one; tokio has no rendezvous channel.
pub fn queue<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    mpsc::channel(capacity.max(1))
}

/// Count of pipeline workers currently alive
///
/// Clones share the same counter, so one gauge can observe a pipeline and
/// every pipeline nested inside it.
#[derive(Debug, Clone, Default)]
pub struct WorkerGauge(Arc<AtomicUsize>);

impl WorkerGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workers that have started and not yet exited
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Count the caller as a worker until the guard is dropped
    pub(crate) fn enter(&self) -> WorkerGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        WorkerGuard(self.0.clone())
    }
}

pub(crate) struct WorkerGuard(Arc<AtomicUsize>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle a source stage uses to publish items
pub struct Emitter<T> {
    tx: Sender<T>,
    token: CancellationToken,
}

impl<T> Emitter<T> {
    /// Publish one item, waiting while the queue is full
    ///
    /// Fails with [`AppError::Cancelled`] if the pipeline is cancelled or the
    /// downstream stage has gone away.
    pub async fn emit(&self, item: T) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| AppError::Cancelled),
        }
    }
}

/// A set of stages connected by bounded queues
///
/// Every stage runs as one or more tasks owned by the pipeline. A stage closes
/// its output exactly once, when its last worker exits. The first stage error
/// is kept and cancels the shared token; [`Pipeline::wait`] returns it once
/// every worker has unwound.
///
/// # Example
///
/// ```ignore
/// let mut pipeline = Pipeline::new(&token);
/// let numbers = pipeline.source("numbers", 4, |emit| async move {
///     for n in 0..10 {
///         emit.emit(n).await?;
///     }
///     Ok(())
/// });
/// let doubled = pipeline.parallel_transform("double", numbers, 4, 3, |n| async move { Ok(n * 2) });
/// let all = pipeline.aggregate("collect", doubled, 1);
/// let batches = pipeline.collect(all).await?;
/// ```
pub struct Pipeline {
    token: CancellationToken,
    tasks: JoinSet<()>,
    first_error: Arc<Mutex<Option<AppError>>>,
    gauge: WorkerGauge,
    span: Span,
}

impl Pipeline {
    /// Create a pipeline whose token is a child of `parent`
    ///
    /// Cancelling `parent` cancels this pipeline; a failure inside this
    /// pipeline does not cancel `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
            first_error: Arc::new(Mutex::new(None)),
            gauge: WorkerGauge::new(),
            span: Span::current(),
        }
    }

    /// Count workers on a shared gauge
    pub fn with_gauge(mut self, gauge: WorkerGauge) -> Self {
        self.gauge = gauge;
        self
    }

    /// Parent span for every worker task
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The pipeline's cancellation token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn gauge(&self) -> WorkerGauge {
        self.gauge.clone()
    }

    /// Number of live workers on this pipeline's gauge
    pub fn active_workers(&self) -> usize {
        self.gauge.get()
    }

    /// Cancel every stage
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Record a failure and cancel the pipeline
    ///
    /// Only the first failure is kept.
    pub fn fail(&self, error: AppError) {
        record_failure(&self.first_error, &self.token, error);
    }

    /// Add a stage that produces items from nothing
    pub fn source<T, F, Fut>(&mut self, name: &'static str, capacity: usize, f: F) -> Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce(Emitter<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = queue(capacity);
        let token = self.token.clone();
        let emitter = Emitter {
            tx,
            token: token.clone(),
        };

        self.spawn_worker(name, async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                result = f(emitter) => result,
            }
        });

        rx
    }

    /// Add a single-worker stage; output order matches input order
    pub fn transform<I, O, F, Fut>(
        &mut self,
        name: &'static str,
        input: Receiver<I>,
        capacity: usize,
        f: F,
    ) -> Receiver<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        self.parallel_transform(name, input, capacity, 1, f)
    }

    /// Add a stage served by `concurrency` workers sharing one input queue
    ///
    /// Items are distributed across workers, so output order is not
    /// preserved when `concurrency > 1`.
    pub fn parallel_transform<I, O, F, Fut>(
        &mut self,
        name: &'static str,
        input: Receiver<I>,
        capacity: usize,
        concurrency: usize,
        f: F,
    ) -> Receiver<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        self.parallel_filter_map(name, input, capacity, concurrency, move |item| {
            let output = f(item);
            async move { output.await.map(Some) }
        })
    }

    /// Like [`Pipeline::parallel_transform`], but items mapped to `None` are
    /// dropped instead of published
    pub fn parallel_filter_map<I, O, F, Fut>(
        &mut self,
        name: &'static str,
        input: Receiver<I>,
        capacity: usize,
        concurrency: usize,
        f: F,
    ) -> Receiver<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<O>>> + Send + 'static,
    {
        let (tx, rx) = queue(capacity);
        let input = Arc::new(tokio::sync::Mutex::new(input));
        let f = Arc::new(f);

        for _ in 0..concurrency.max(1) {
            let input = input.clone();
            let tx = tx.clone();
            let f = f.clone();
            let token = self.token.clone();

            self.spawn_worker(name, async move {
                loop {
                    let Some(item) = next_item(&input, &token).await? else {
                        return Ok(());
                    };

                    let output = tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(AppError::Cancelled),
                        result = f(item) => result.map_err(|e| e.in_stage(name))?,
                    };

                    let Some(output) = output else {
                        continue;
                    };

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(AppError::Cancelled),
                        sent = tx.send(output) => sent.map_err(|_| AppError::Cancelled)?,
                    }
                }
            });
        }

        rx
    }

    /// Add a stage that drains its input and emits everything as one batch
    pub fn aggregate<T>(&mut self, name: &'static str, mut input: Receiver<T>, capacity: usize) -> Receiver<Vec<T>>
    where
        T: Send + 'static,
    {
        let (tx, rx) = queue(capacity);
        let token = self.token.clone();

        self.spawn_worker(name, async move {
            let mut batch = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(AppError::Cancelled),
                    item = input.recv() => match item {
                        Some(item) => batch.push(item),
                        None => break,
                    },
                }
            }

            tracing::debug!(stage = name, items = batch.len(), "aggregated");

            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                sent = tx.send(batch) => sent.map_err(|_| AppError::Cancelled),
            }
        });

        rx
    }

    /// Drain the final queue, then wait for every worker to exit
    pub async fn collect<T>(self, mut output: Receiver<T>) -> Result<Vec<T>> {
        let token = self.token.clone();
        let mut items = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = output.recv() => match item {
                    Some(item) => items.push(item),
                    None => break,
                },
            }
        }

        drop(output);
        self.wait().await?;

        // a cancelled run never hands back partial output
        if token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(items)
    }

    /// Wait for every worker to exit and return the first failure, if any
    pub async fn wait(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    self.fail(AppError::Internal(format!("pipeline worker panicked: {}", e)));
                }
            }
        }

        match self.first_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn spawn_worker<Fut>(&mut self, name: &'static str, work: Fut)
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let guard = self.gauge.enter();
        let first_error = self.first_error.clone();
        let token = self.token.clone();
        let span = tracing::debug_span!(parent: &self.span, "stage", stage = name);

        self.tasks.spawn(
            async move {
                let _guard = guard;
                match work.await {
                    Ok(()) => tracing::trace!("worker finished"),
                    Err(error) => {
                        if !error.is_cancelled() {
                            tracing::error!(error = %error, "stage failed");
                        }
                        record_failure(&first_error, &token, error.in_stage(name));
                    }
                }
            }
            .instrument(span),
        );
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.tasks.len())
            .field("active_workers", &self.gauge.get())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Take the next item from a shared queue, or `None` once it is closed
async fn next_item<I>(
    input: &tokio::sync::Mutex<Receiver<I>>,
    token: &CancellationToken,
) -> Result<Option<I>> {
    let mut rx = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(AppError::Cancelled),
        rx = input.lock() => rx,
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AppError::Cancelled),
        item = rx.recv() => Ok(item),
    }
}

fn record_failure(slot: &Mutex<Option<AppError>>, token: &CancellationToken, error: AppError) {
    {
        let mut slot = slot.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
    token.cancel();
}
