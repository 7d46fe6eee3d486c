//! External collaborator clients.
//!
//! Each pipeline stage delegates its expensive work to a collaborator
//! behind a trait seam, so workers can be exercised with test doubles and
//! the services can be swapped without touching orchestration:
//! - [`Preprocessor`]: image cleanup (local, `image` crate)
//! - [`Recognizer`]: text recognition (HTTP service)
//! - [`Translator`]: translation (HTTP service)
//! - [`Renderer`]: PDF rendering (HTTP service)

pub mod config;
pub mod error;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod translate;

pub use config::ClientsConfig;
pub use error::{ClientError, ClientResult};
pub use ocr::{HttpRecognizer, Recognizer};
pub use pdf::{HttpRenderer, Renderer};
pub use preprocess::{LocalPreprocessor, Preprocessor};
pub use translate::{HttpTranslator, Translator};
