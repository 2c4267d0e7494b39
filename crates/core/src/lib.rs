pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use calendar::FiscalCalendar;
pub use config::AppConfig;
pub use error::{LifecycleError, LifecycleResult};
