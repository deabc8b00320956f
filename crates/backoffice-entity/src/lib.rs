//! # backoffice-entity
//!
//! Domain entity models for Backoffice. Database entities derive
//! `sqlx::FromRow`; manifest descriptors are plain serde values read from
//! the extensions directory.

pub mod extension;
