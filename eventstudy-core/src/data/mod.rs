pub mod dates;
pub mod error;
pub mod panel;
pub mod raw;
pub mod results;
pub mod schema;
pub mod table;

pub use dates::DateParser;
pub use error::DataError;
pub use panel::{build_prepared, read_prepared, write_prepared, DayZeroMatch, PreparedRow};
pub use raw::{
    load_link, load_observations, load_worldscope, LinkRow, MissingReturnPolicy, ObservationLoad,
    RawColumns, WorldscopeRow,
};
pub use results::{read_annual_bhr, read_event_bhr, write_annual_bhr, write_event_bhr};
pub use table::{read_table, write_table, TableFormat};
