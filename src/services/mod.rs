// Services module
// Contains the launcher branches separated by concern

pub mod setup; // Environment provisioning
pub mod smoke; // Inference smoke tests
pub mod webui; // Web UI launch
