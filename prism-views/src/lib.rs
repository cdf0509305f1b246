//! Alternative views of a news article.
//!
//! - [`extract`]: lexical HTML to text
//! - [`fetch`]: URL vetting and page download
//! - [`prompt`]: the view-generation prompt and model call
//! - [`recover`]: strategy ladder that digs a JSON array out of a reply
//! - [`normalize`]: `View` records with positional defaults
//! - [`pipeline`]: all of the above, plus optional image enrichment

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod recover;

pub use normalize::{MAX_VIEWS, View};
pub use pipeline::{ViewInput, ViewPipeline};
