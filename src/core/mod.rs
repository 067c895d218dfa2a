// Pipeline stages and the error model they share.
pub mod compare;
pub mod error;
pub mod loader;
pub mod selection;
pub mod writer;
