//! Service Layer
//!
//! Multi-step writes that handlers delegate to: the import pipeline, the
//! service-contract workflow, lead conversion, document metadata, plus the
//! audit writer and calendar sync they cascade into.

pub mod access;
pub mod audit;
pub mod calendar;
pub mod contracts;
pub mod documents;
pub mod imports;
pub mod leads;
