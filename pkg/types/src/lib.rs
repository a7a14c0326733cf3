//! Resource data model shared by the store and the controllers.

pub mod appservice;
pub mod config;
pub mod deployment;
pub mod meta;
pub mod pod;
pub mod service;
