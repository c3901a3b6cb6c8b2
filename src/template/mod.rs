//! # Templates
//!
//! Materializes manifest bytes from named templates.
//!
//! - `reader`: the [`TemplateReader`] source contract plus filesystem and in-memory sources
//! - `functions`: [`TemplateFunctions`], the custom functions handed to a renderer
//! - `renderer`: [`TemplateRenderer`], single-file and directory rendering

mod functions;
mod reader;
mod renderer;

pub use functions::TemplateFunctions;
pub use reader::{FileSystemReader, InMemoryReader, ReaderError, TemplateReader};
pub use renderer::{MissingKey, RenderedTemplate, RendererOptions, TemplateRenderer};
