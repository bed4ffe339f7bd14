//! Anchoring annotations to elements of large HTML documents.
//!
//! - [`processing`] splits documents into size-bounded chunks along
//!   structural boundaries.
//! - [`anchoring`] validates CSS selectors against a full document and
//!   repairs them from the annotated text.
//! - [`annotation`] drives chunked annotation generation under a
//!   concurrency ceiling.

pub mod anchoring;
pub mod annotation;
pub mod config;
pub mod dom;
pub mod error;
pub mod llm;
pub mod models;
pub mod processing;
