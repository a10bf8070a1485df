pub mod fetch;
pub mod list;
pub mod serve;
