/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Account endpoints (register, login, me)
/// - `releases`: Release listing and maintenance
/// - `scan`: Manifest upload and registry resolution
/// - `import`: Bulk import of scan rows
/// - `admin`: User administration

pub mod admin;
pub mod auth;
pub mod health;
pub mod import;
pub mod releases;
pub mod scan;
