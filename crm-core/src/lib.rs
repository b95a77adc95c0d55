//! CRM Core - Entity Types and Domain Rules
//!
//! Data types shared by every crate in the workspace plus the pure parts of
//! the two workflows: CSV lead import and service-contract scheduling.
//! Nothing in here performs I/O.

pub mod audit;
mod entities;
mod enums;
mod error;
mod filter;
pub mod i18n;
mod identity;
pub mod import;
pub mod permissions;
pub mod schedule;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use filter::*;
pub use i18n::Locale;
pub use identity::*;
pub use import::{ImportLimits, ImportPreview, LeadRecord, RowIssue, StagedRow};
pub use permissions::Action;
