//! HTTP path constants

pub const HEALTH: &str = "/health";
pub const RESTART: &str = "/restart";
pub const CONFIG: &str = "/config";
