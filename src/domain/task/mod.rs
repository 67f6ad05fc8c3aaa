//! Task domain - durable background jobs
//!
//! Producers enqueue [`TaskEnvelope`]s through a [`TaskQueue`]; workers dequeue a
//! [`TaskDelivery`], dispatch it to the [`TaskHandler`] registered for its type and then
//! ack, retry or archive it depending on the [`TaskError`] kind.

mod envelope;
mod handler;
mod payload;
mod queue;

pub use envelope::{TaskDelivery, TaskEnvelope};
pub use handler::{TaskError, TaskHandler};
pub use payload::{SendVerificationEmailPayload, TASK_SEND_VERIFICATION_EMAIL};
pub use queue::{MaintenanceReport, QueueStats, TaskQueue};
