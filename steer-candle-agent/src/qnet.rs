//! Q-network for discrete steering actions.
mod base;
mod config;
mod mlp;
pub use base::QNet;
pub use config::{CriticLoss, QNetConfig};
pub use mlp::Mlp;
