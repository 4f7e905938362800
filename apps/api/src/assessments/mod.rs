//! Assessment store: owns the organization/employee document lifecycle
//! (new -> in_progress -> completed, with completed staying editable),
//! whole-document overwrite persistence, and completion metrics.

pub mod handlers;
pub mod store;
