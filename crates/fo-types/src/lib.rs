pub mod errors;
pub mod history;
pub mod position;

pub use errors::*;
pub use history::*;
pub use position::*;
