//! Diagnostics of training and evaluation.
//!
//! Each learning step of an algorithm produces a [`Record`], a set of named
//! values such as `loss_actor` or `critic_avg_q`. Records flow into a
//! [`Recorder`], which may keep them ([`BufferedRecorder`]), drop them
//! ([`NullRecorder`]) or aggregate them and write summaries to the log
//! ([`LogRecorder`]).
//!
//! ```rust
//! use ocrl_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss_critic", 0.5);
//! record.insert("obs", RecordValue::Array1(vec![1.0, 2.0]));
//! assert_eq!(record.get_scalar("loss_critic").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;
