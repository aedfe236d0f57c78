//! Helper functions shared by the formatter, templates and generator

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
