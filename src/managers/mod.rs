// Managers Module
//
// Each manager handles one specific concern:
// - CalibrationService: store mutations, re-fit, and snapshot publication
// - ChangeBroadcaster: tokio broadcast channel fan-out to observers

pub mod broadcast_manager;
pub mod calibration_service;

pub use broadcast_manager::{CalibrationUpdate, ChangeBroadcaster};
pub use calibration_service::CalibrationService;
