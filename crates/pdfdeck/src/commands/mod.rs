pub mod completion;
pub mod config;
pub mod convert;
pub mod serve;
