//! lexicon-linker: Formatting and cross-linking for the Lexicon knowledge base
//!
//! This crate provides:
//! - `formatter`: loosely structured text to compact HTML
//! - `markup`: lenient HTML tokenizer that tracks anchor nesting
//! - `matcher` and `linker`: whole-word title matching and anchor insertion
//! - `pass`: the corpus-wide, bidirectional cross-linking pass
//! - `worker`: the single-consumer background queue that runs passes
//! - `memory`: an in-memory corpus repository

pub mod formatter;
pub mod linker;
pub mod markup;
pub mod matcher;
pub mod memory;
pub mod pass;
pub mod worker;

pub use formatter::format;
pub use linker::{CrossLinker, ENTRY_PATH_PREFIX, LinkError, LinkedBody, entry_href, linkify};
pub use markup::{Fragment, MarkupError, TextNode};
pub use memory::{MemoryCorpus, MemoryCorpusError};
pub use pass::{CorpusSnapshot, CrossLinkOutcome, PassError, PassReport, cross_link_corpus, run_pass};
pub use worker::{LinkJob, LinkQueue, LinkWorker, WorkerError, WorkerStats};
