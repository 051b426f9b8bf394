//! Mnemo - conversational memory and recall for interactive assistants
//!
//! This crate persists past conversations (sessions with ordered messages),
//! indexes each session with keywords, a summary, and a dense vector, and
//! answers recall queries with hybrid lexical + vector search under time
//! decay.
//!
//! # Architecture
//!
//! - [`cli`] - command-line interface using clap
//! - [`model`] - data types (Session, Message, RecallResult)
//! - [`storage`] - SQLite layer: relational tables, FTS5, vector BLOBs
//! - [`embeddings`] - embedding providers (local ONNX, deterministic mock)
//! - [`index`] - keyword/summary/vector derivation and re-index policy
//! - [`recall`] - hybrid search, query classification, context rendering
//! - [`service`] - lifecycle facade and background index worker
//! - [`import`] - legacy wire-log importer
//! - [`config`] - configuration management
//! - [`error`] - error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

pub mod cli;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod import;
pub mod index;
pub mod model;
pub mod recall;
pub mod service;
pub mod storage;

pub use error::{Error, Result};
