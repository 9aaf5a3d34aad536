pub mod config;
pub mod derived;
pub mod export;
pub mod load;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod store;
pub mod sync;
