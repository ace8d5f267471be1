//! Domain types for the event-study pipeline

pub mod bhr;
pub mod event;
pub mod firm_year;
pub mod ids;
pub mod observation;

pub use bhr::{AnnualBhr, EventBhr};
pub use event::{AnnouncementEvent, CandidateRow, EventKey, MatchedRow, Quarter};
pub use firm_year::FirmYearRecord;
pub use ids::{InfoCode, WsCode};
pub use observation::TradingObservation;
