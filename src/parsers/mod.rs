pub mod html;
pub mod style;

#[cfg(test)]
mod tests;

pub use html::parse_document;
