pub mod args;
pub mod cipher;
pub mod config;
pub mod couchbase;
pub mod fs_util;
pub mod manager;
pub mod pipeline;
pub mod process;
pub mod store;
pub mod template;
pub mod topology;
pub mod utils;

pub use args::Args;
