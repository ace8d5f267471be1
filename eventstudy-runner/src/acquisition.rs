//! Query text for pulling the raw tables from the research database.
//!
//! Only the SQL is produced here. Connecting, authenticating and persisting the
//! result sets are left to whatever tool the user runs the queries with.

use serde::{Deserialize, Serialize};

pub const WORLDSCOPE_TABLE: &str = "tr_worldscope.wrds_ws_stock";
pub const DATASTREAM_TABLE: &str = "tr_ds_equities.wrds_ds2dsf";
pub const LINK_TABLE: &str = "wrdsapps_link_datastream_wscope.ds2ws_linktable";

/// Variable and filter lists per table. Empty lists mean "all columns" and
/// "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub worldscope_vars: Vec<String>,
    pub worldscope_filters: Vec<String>,
    pub datastream_vars: Vec<String>,
    pub datastream_filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub name: &'static str,
    pub table: &'static str,
    pub vars: Vec<String>,
    pub filters: Vec<String>,
}

impl QuerySpec {
    pub fn render(&self) -> String {
        let vars = if self.vars.is_empty() {
            "*".to_string()
        } else {
            self.vars.join(", ")
        };
        let filters = if self.filters.is_empty() {
            "1=1".to_string()
        } else {
            self.filters.join(" AND ")
        };
        format!("SELECT {vars} FROM {} WHERE {filters}", self.table)
    }
}

impl AcquisitionConfig {
    /// Worldscope, Datastream and link queries, in that order.
    pub fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                name: "worldscope",
                table: WORLDSCOPE_TABLE,
                vars: self.worldscope_vars.clone(),
                filters: self.worldscope_filters.clone(),
            },
            QuerySpec {
                name: "datastream",
                table: DATASTREAM_TABLE,
                vars: self.datastream_vars.clone(),
                filters: self.datastream_filters.clone(),
            },
            QuerySpec {
                name: "link",
                table: LINK_TABLE,
                vars: Vec::new(),
                filters: Vec::new(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_select_everything() {
        let queries = AcquisitionConfig::default().queries();
        assert_eq!(
            queries[2].render(),
            "SELECT * FROM wrdsapps_link_datastream_wscope.ds2ws_linktable WHERE 1=1"
        );
    }

    #[test]
    fn vars_and_filters_are_joined() {
        let config = AcquisitionConfig {
            worldscope_vars: vec!["code".into(), "year_".into(), "item5901".into()],
            worldscope_filters: vec!["year_ >= 2000".into(), "freq = 'A'".into()],
            ..Default::default()
        };
        assert_eq!(
            config.queries()[0].render(),
            "SELECT code, year_, item5901 FROM tr_worldscope.wrds_ws_stock WHERE year_ >= 2000 AND freq = 'A'"
        );
    }
}
