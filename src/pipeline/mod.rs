//! Bounded-queue stage abstraction
//!
//! A [`Pipeline`] owns a set of worker tasks connected by bounded
//! `tokio::sync::mpsc` queues and shares one cancellation token between them.
//! Three stage shapes are provided:
//!
//! - [`Pipeline::transform`] - one worker, order preserved
//! - [`Pipeline::parallel_transform`] - a worker pool draining a shared queue
//! - [`Pipeline::aggregate`] - drains its input and emits a single batch
//!
//! plus [`Pipeline::source`] for the stage that feeds the first queue.
//!
//! A full queue stalls its producers. When any stage fails, the error is
//! kept, the token is cancelled, and every other stage stops and closes its
//! output so nothing downstream waits forever.

/// Pipeline, stage workers, and worker accounting.
pub mod stage;

pub use stage::{queue, Emitter, Pipeline, WorkerGauge};
