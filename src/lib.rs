pub mod api;
pub mod config;
pub mod logging;
pub mod openai;
pub mod store;
pub mod summarizer;
pub mod sweeper;
