pub mod frame;
pub mod service;

pub use service::SensorService;
