//! Extension domain entities.

pub mod descriptor;
pub mod model;
pub mod setting;

pub use descriptor::ExtensionDescriptor;
pub use model::{ExtensionRecord, UpsertExtension};
pub use setting::ExtensionSetting;
