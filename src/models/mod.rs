pub mod baby;
pub mod log;
pub mod measurement;
pub mod record;
pub mod user;

pub use baby::{Baby, Gender};
pub use log::AuditLog;
pub use measurement::Measurement;
pub use record::{Record, RecordType, SubType};
pub use user::{AdminUser, Role, User};
