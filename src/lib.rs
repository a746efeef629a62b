#![allow(clippy::implicit_hasher)]
#![allow(unknown_lints)]

pub mod broadcast;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod route_index;
pub mod simulator;
pub mod time;

pub use broadcast::{SimulationEvent, Subscription};
pub use config::SimulationConfig;
pub use error::LoadError;
pub use simulator::Simulator;
