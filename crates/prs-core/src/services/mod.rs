pub mod compose;
pub mod config_check;
pub mod config_store;
pub mod orchestrator;
pub mod ports;
pub mod process;
pub mod settings;
pub mod workload;
pub(crate) mod yaml_edit;

pub use config_store::ConfigStore;
pub use orchestrator::RestartOrchestrator;
pub use ports::PortPicker;
pub use process::{Elevation, ProcessRunner, SystemRunner};
