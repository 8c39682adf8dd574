mod extract;
mod local;

pub use extract::{docx_to_text, pdf_to_text};
pub use local::LocalIngestor;
