//! # Tax Law Context
//!
//! Ingestion and retrieval of Nigerian tax-law PDFs for AI prompt assembly.
//!
//! A PDF is extracted into positioned text, normalized into clean page text,
//! classified into headings and body paragraphs, assembled into an outline
//! tree, packed into token-bounded chunks that remember their section path
//! and pages, and indexed for keyword search. Queries return ranked chunks
//! or a formatted context string sized to a token budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────────────────┐
//! │  Source  │──▶│  Extract   │──▶│  Normalize → Detect →    │
//! │ path/URL │   │ pdf-extract│   │  Outline → Chunk → Index │
//! └──────────┘   └────────────┘   └────────────┬─────────────┘
//!                                              │
//!                     ┌────────────────────────┤
//!                     ▼                        ▼
//!              ┌─────────────┐          ┌────────────┐
//!              │   Manager   │◀────────▶│   Cache    │
//!              │ query/context│          │  SQLite    │
//!              └─────────────┘          └────────────┘
//! ```
//!
//! The I/O-free stages live in the `taxlaw-context-core` crate; this crate
//! adds PDF extraction, fetching, persistence and the document lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! taxctx init                                   # create the cache database
//! taxctx ingest ./docs/nta-2025.pdf
//! taxctx search "withholding tax on dividends" --source ./docs/nta-2025.pdf
//! taxctx context "VAT exemptions" --source ./docs/nta-2025.pdf --max-tokens 1500
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source`] | Document sources, keys and fetching |
//! | [`extract`] | Positional PDF text extraction |
//! | [`ingest`] | Pipeline orchestration and cancellation |
//! | [`manager`] | Document lifecycle, single-flight loads, queries |
//! | [`cache`] | Persisted document snapshots |
//! | [`commands`] | CLI command implementations |
//! | [`error`] | Ingestion error type |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod manager;
pub mod migrate;
pub mod source;
