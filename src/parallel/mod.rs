//! Bounded parallel execution with early abort
//!
//! Runs a pass/fail check over a fixed set of work items on a pool of OS threads.
//! Items are independent and each one may block on an external process, so the
//! pool is sized to the available processing units rather than to the work.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  all items, up front   ┌──────────────┐
//! │  run(items)  │───────────────────────▶│  work queue  │
//! └──────┬───────┘                        └──────┬───────┘
//!        │                                       │ try_recv, one at a time
//!        │                      ┌────────────────┼────────────────┐
//!        │                      ▼                ▼                ▼
//!        │                ┌──────────┐     ┌──────────┐     ┌──────────┐
//!        │                │ worker 0 │ ... │ worker i │ ... │ worker n │
//!        │                └────┬─────┘     └────┬─────┘     └────┬─────┘
//!        │                     └─── one outcome per item ────────┘
//!        ▼                                      │
//! ┌──────────────┐     recv_timeout(poll)       │
//! │  collector   │◀─────────────────────────────┘
//! │ (caller's    │── raises the stop signal on cancellation
//! │  thread)     │
//! └──────────────┘
//! ```
//!
//! - Workers check the shared [`StopSignal`] before every dequeue. The first
//!   failing item raises it; items already in flight finish, nothing new starts.
//! - The aggregate is reduced by the collector alone from per-item outcomes, so
//!   there is no shared result cell to lose updates on.
//! - The collector wakes at least once per poll interval to look at the external
//!   cancellation signal (Ctrl-C in the CLI) even while every worker is busy.
//! - A panic inside the item callback is caught and counted as a failed item.
//!
//! # Example
//!
//! ```rust
//! use formatguard::parallel::WorkScheduler;
//!
//! let scheduler = WorkScheduler::new(4);
//! assert!(scheduler.run((1..=100).collect::<Vec<u32>>(), &|n: &u32| *n > 0));
//! assert!(!scheduler.run((1..=100).collect::<Vec<u32>>(), &|n: &u32| *n != 42));
//! ```

pub mod scheduler;

pub use scheduler::{RunSummary, StopSignal, WorkScheduler, Worker, calculate_optimal_workers};
