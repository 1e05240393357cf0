pub mod extractor;
pub mod indexer;
pub mod language;

pub use extractor::{analyze_module, analyze_source};
pub use indexer::ModuleIndexer;
pub use language::LanguageRegistry;
