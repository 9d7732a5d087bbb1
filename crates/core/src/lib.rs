//! Core library for things2gtasks
//!
//! This crate implements the **Functional Core** of the things2gtasks
//! application, following the Functional Core - Imperative Shell architectural
//! pattern.
//!
//! # Architecture Overview
//!
//! The project uses a two-crate architecture to enforce separation of concerns:
//!
//! - **`things2gtasks_core`** (this crate): hierarchy model, mapping rules and
//!   the migration engine, with zero direct I/O
//! - **`things2gtasks`**: SQLite access, OAuth, HTTP and the CLI (the
//!   Imperative Shell)
//!
//! The migration engine does talk to a task service, but only through the
//! [`destination::Destination`] trait. The shell plugs in the Google Tasks
//! client; tests plug in an in-memory fake.
//!
//! # Module Organization
//!
//! - [`model`]: source records and the assembled Forest
//! - [`assemble`]: flat records → Forest, with dangling-reference checks
//! - [`plan`]: the depth-collapsing mapping from an area to create operations
//! - [`migrate`]: sequential execution of plans with per-area failure isolation
//! - [`reset`]: the clean-slate pre-pass
//! - [`destination`]: the task service contract
//! - [`google`]: Google Tasks payloads and error classification
//! - [`retry`]: backoff policy used by destination implementations
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use things2gtasks_core::{assemble::assemble, migrate::migrate};
//!
//! let forest = assemble(areas, projects, headings, tasks)?;
//! let report = migrate(&forest, &mut client).await;
//!
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.area_title, failure.error);
//! }
//! ```

pub mod assemble;
pub mod destination;
pub mod error;
pub mod google;
pub mod migrate;
pub mod model;
pub mod plan;
pub mod reset;
pub mod retry;

#[cfg(test)]
pub(crate) mod fake;
