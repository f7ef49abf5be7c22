pub mod rbac;

pub use rbac::{AccessGate, PermissionDef};
