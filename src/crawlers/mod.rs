pub mod extractor;
pub mod fetcher;

#[cfg(test)]
mod tests;

pub use extractor::Extractor;
pub use fetcher::{Fetcher, HttpFetcher};
