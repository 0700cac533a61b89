//! Local-network video library server: index a folder of videos and stream
//! them over HTTP with byte-range support.

pub mod cli;
pub mod config;
pub mod http;
pub mod media;
pub mod stream;
pub mod thumbnails;
