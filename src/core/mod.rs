//! Core application primitives: detector lifecycle and the control surface

pub mod http;
pub mod manager;
pub mod shutdown;

pub use http::{create_router, start_server, AppState};
pub use manager::{DetectorStatus, ScannerManager};
pub use shutdown::{stop_channel, StopHandle, StopSignal};
