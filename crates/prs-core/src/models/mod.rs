pub mod command;
pub mod config;
pub mod restart;

pub use command::{CommandOutput, CommandSpec};
pub use config::{DockerSettings, ListenerSettings, PangolinSettings, PortRange, ServiceConfig};
pub use restart::{RestartResult, RestartStage};
