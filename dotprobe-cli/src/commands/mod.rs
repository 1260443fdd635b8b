pub mod common;
pub mod deps;
pub mod info;
pub mod worker;
