pub mod alert;
pub mod document;

pub use alert::{AlertRow, AlertView, PendingAlert, PendingAlertRow};
pub use document::{AlertOwner, DocumentExpiry, DocumentKind};
