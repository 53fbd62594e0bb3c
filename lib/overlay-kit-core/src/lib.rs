pub mod config;
mod error;
pub mod overlay;
pub mod paths;

pub use config::Config;
pub use error::{OverlayError, OverlayResult};
pub use overlay::{
    AsyncOverlayContext, OverlayContext, OverlayController, OverlayId, OverlayInstance,
    OverlayResponse, OverlayStore, OverlaySurface, RenderedOverlay, Subscription,
};

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}
