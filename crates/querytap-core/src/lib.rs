pub mod byte_reader;
pub mod config;
pub mod conversation;
pub mod error;
pub mod packet;
pub mod pipeline;
pub mod reaper;
pub mod sink;
pub mod source;
pub mod stream_store;
pub mod traffic;
