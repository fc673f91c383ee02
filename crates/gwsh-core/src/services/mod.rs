//! Services that orchestrate operations over the ports.

mod flow_service;

pub use flow_service::{FlowService, FlowTimeouts};
