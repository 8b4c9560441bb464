pub mod aggregate;
pub mod clock;
pub mod config;
pub mod consts;
pub mod controller;
pub mod gate;
pub mod logging;
pub mod messages;
pub mod progress;
pub mod render;
