pub mod service;

pub use service::{BusMessage, CareRelay};
