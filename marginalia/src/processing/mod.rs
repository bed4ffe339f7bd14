mod boundary;
mod chunker;

pub use boundary::{select_boundaries, Boundaries, BoundaryRule};
pub use chunker::{chunk_document, extract_parent_context, DocumentChunker};
