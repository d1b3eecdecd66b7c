mod preprocess;
#[allow(clippy::module_inception)]
mod tokenizer;

pub use preprocess::{PreparedQuery, QueryPreprocessor};
pub use tokenizer::Tokenizer;
