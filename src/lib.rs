//! # twindex
//!
//! An ingestion coordination engine that mirrors a remote document
//! corpus into structured "digital twin" JSON artifacts plus retrieval
//! chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Change feed │──▶│   Tracker    │──▶│  Registry    │
//! │ (partition) │   │ cursor/delta │   │ SQLite, CAS │
//! └─────────────┘   └──────┬───────┘   └──────┬──────┘
//!                          ▼                  ▼
//!                   ┌─────────────┐   ┌──────────────┐
//!                   │Object store │──▶│    Router    │
//!                   │ source/ ... │   │ sync / async │
//!                   └─────────────┘   └──────┬───────┘
//!                                            ▼
//!                                     ┌──────────────┐   ┌─────────┐
//!                                     │ Twin builder │──▶│ Chunker │
//!                                     │ extracted/.. │   │         │
//!                                     └──────────────┘   └─────────┘
//! ```
//!
//! Each document's change record, extraction dispatch, and completion
//! callback are independent units of work. Per-key ordering comes from
//! the registry's conditional writes, never from in-memory locks; all
//! state between the async submit and its completion lives in the
//! registry.
//!
//! ## Quick Start
//!
//! ```bash
//! twindex init                      # create the registry database
//! twindex sync all                  # pull deltas from every partition
//! twindex dispatch --pending        # route stored documents to extraction
//! twindex complete <job_id>         # deliver an analysis completion
//! twindex chunk source/docs/a.docx  # chunk a finished twin
//! twindex stats                     # registry overview
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`tracker`] | Incremental change tracking |
//! | [`cursor`] | Per-partition sync cursors |
//! | [`registry`] | Document lifecycle store |
//! | [`router`] | Extraction routing and completion |
//! | [`extract`] | Synchronous office/text extraction |
//! | [`twin`] | Digital twin assembly |
//! | [`chunker`] | Overlapping retrieval chunks |
//! | [`source`] | Change-source capability |
//! | [`store`] | Object-storage capability |
//! | [`analysis`] | Heavy-analysis capability |
//! | [`reconcile`] | Storage-vs-registry reconciliation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analysis;
pub mod chunker;
pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod paths;
pub mod reconcile;
pub mod registry;
pub mod router;
pub mod source;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod twin;
