//! Markup tree adapter over `kuchikikiki`: parsing, selector queries,
//! mutation and serialization.

mod builder;
mod document;
mod element;

pub use document::{Document, Selector};
pub use element::Element;
