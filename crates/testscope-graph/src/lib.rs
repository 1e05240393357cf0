pub mod builder;
pub mod resolver;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use builder::{build_analysis, ImpactAnalysis, ReverseGraph};
pub use resolver::ImpactResolver;
pub use tokens::TokenCollector;
