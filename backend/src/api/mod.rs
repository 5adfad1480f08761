pub mod extract;
pub mod search;

pub use extract::*;
pub use search::*;
