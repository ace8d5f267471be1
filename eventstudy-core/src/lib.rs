//! Event-study core: domain types, raw-table ingest, record linkage, event
//! windows, trading-day matching, zero-return shifting, sample selection and
//! buy-and-hold return aggregation.
//!
//! Stages run in order and each consumes the previous stage's output:
//! - [`data::raw`] loads the Worldscope, Datastream and link tables
//! - [`linkage`] joins them into a firm-year panel
//! - [`filter`] keeps firm-years with four usable announcement dates
//! - [`window`] melts announcements and expands candidate dates
//! - [`matcher`] resolves candidates to trading days
//! - [`shifter`] moves zero-return rows to the next informative day
//! - [`selector`] keeps complete firm-years
//! - [`aggregate`] computes event and annual BHR
//!
//! Every stage reports through an injected [`report::PipelineReporter`].

pub mod aggregate;
pub mod data;
pub mod domain;
pub mod filter;
pub mod linkage;
pub mod matcher;
pub mod report;
pub mod selector;
pub mod shifter;
pub mod window;
