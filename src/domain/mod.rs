mod macros;
mod ids;
mod objects;
mod errors;
mod mentions;
mod langcode;

pub use ids::*;
pub use objects::*;
pub use errors::*;
pub use mentions::*;
pub use langcode::*;
