pub mod classes;
pub mod protocol;
pub mod species;

pub use classes::*;
pub use protocol::*;
pub use species::*;
