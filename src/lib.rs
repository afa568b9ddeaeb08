pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod ui;
pub mod web;
