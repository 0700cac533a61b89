pub mod cache;
pub mod catalog;
pub mod library;
pub mod metadata;
pub mod mime;
pub mod scanner;
pub mod stats;
