//! # Tax Law Context Core
//!
//! Pure pipeline logic for Tax Law Context: data models, page
//! normalization, heading detection, outline construction, chunking, the
//! search-index abstraction and the query engine.
//!
//! This crate contains no tokio, sqlx, filesystem or network I/O. PDF
//! extraction, fetching, caching and the document manager live in the
//! `taxlaw-context` crate on top of it.
//!
//! Stages, in pipeline order:
//!
//! | Stage | Module |
//! |-------|--------|
//! | Normalizer | [`normalize`] |
//! | Structure Detector | [`detect`] |
//! | Structure Builder | [`structure`] |
//! | Chunker | [`chunk`] |
//! | Indexer | [`index`] |
//! | Query Engine | [`search`] |

pub mod chunk;
pub mod detect;
pub mod document;
pub mod index;
pub mod models;
pub mod normalize;
pub mod search;
pub mod structure;
