//! API Request and Response Types
//!
//! Entities themselves (from `crm-core`) are returned as-is; this module
//! holds the request bodies, query parameters and workflow responses.

mod account;
pub use account::*;

mod contact;
pub use contact::*;

mod lead;
pub use lead::*;

mod opportunity;
pub use opportunity::*;

mod activity;
pub use activity::*;

mod note;
pub use note::*;

mod document;
pub use document::*;

mod profile;
pub use profile::*;

mod contract;
pub use contract::*;

mod import;
pub use import::*;
