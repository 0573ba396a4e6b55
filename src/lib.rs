pub mod api;
pub mod app;
pub mod executor;
pub mod input;
pub mod settings;
pub mod setup;
pub mod topology;
