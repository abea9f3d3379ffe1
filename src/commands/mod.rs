mod check;
mod config;
mod download;
mod install;
mod report;
mod services;

pub use check::check;
pub use config::{set_api_url, show_config};
pub use download::download;
pub use install::install;
pub use services::{DesktopManager, Services, USER_AGENT, build_manager};
