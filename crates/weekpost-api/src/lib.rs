pub mod error;
pub mod service;
pub mod validation;

pub use error::ApiError;
pub use service::WeeklyService;
