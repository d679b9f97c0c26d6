//! Feature flag service backed by MongoDB with an in-memory fallback.

pub mod app_config;
pub mod flags;
pub mod storage;
pub mod web;
