// Output module for boltctl

pub mod errors;
pub mod messages;
pub mod terminal;

pub use errors::*;
pub use terminal::*;
