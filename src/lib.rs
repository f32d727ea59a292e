pub mod aggregate;
pub mod backend;
pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod label_cache;
pub mod notice;
pub mod readings;
pub mod remote;
pub mod views;
pub mod vocabulary;
pub mod weather;
