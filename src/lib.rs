//! Screen-reading auto-clicker for the Blum drop game.
//!
//! Locates the game window by template matching, then clicks falling objects
//! found by colour segmentation until the round ends, round after round, until
//! the operator touches the mouse between rounds.

pub mod capture;
pub mod click;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod state;
pub mod templates;
pub mod utils;
pub mod vision;

pub use capture::{MonitorCapture, ScreenCapture};
pub use config::{CategoryRole, Config, DetectionCategory, GameVariant};
pub use controller::GameLoopController;
pub use error::{AppResult, ControllerError, LocateError};
pub use geometry::{BBox, Margins, Point};
pub use input::{ActivityEvent, InputInjector, MouseButton, RdevInjector};
pub use state::RoundState;
pub use templates::TemplateSet;
