pub mod config;
pub mod decoder;
pub mod display;
pub mod gui;
pub mod pipeline;
pub mod workers;
