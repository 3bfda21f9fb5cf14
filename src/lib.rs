pub mod address;
pub mod constants;
pub mod disk;
pub mod error;
pub mod io;
pub mod memory;
pub mod pte;
pub mod replacement;
pub mod translation;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{DatError, Result};
pub use translation::{Translation, TranslationRequest, translate};
