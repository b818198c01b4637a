//! Shared types for the status board hub and poller.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::{
    Channel, DayHours, HoursPayload, OpenState, PrintersPayload, ProducerFrame, ProducerReport,
    SignPayload, SignReport, SwitchState,
};
