pub mod builders;
pub mod scripted_remote;

pub use builders::*;
pub use scripted_remote::*;
