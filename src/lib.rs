pub mod assets;
pub mod canvas;
pub mod config;
pub mod detector;
pub mod error;
pub mod face;
pub mod geometry;
pub mod model_resolver;
pub mod overlay;
pub mod render_loop;
pub mod shell;
pub mod source;

pub use error::ErrorWrapper;
