pub mod backend;
pub mod common;
