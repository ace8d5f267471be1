//! Record linkage: Worldscope ⋈ link table on `code`, then ⋈ Datastream on
//! `infocode`, both as inner joins.
//!
//! Instead of materialising the firm-year × trading-day product, the result is
//! a [`Panel`]: the linked firm-year records plus the de-duplicated trading
//! observations of exactly the firms those records reference.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::raw::{LinkRow, WorldscopeRow};
use crate::domain::{FirmYearRecord, InfoCode, TradingObservation, WsCode};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// Linked firm-years and their trading history.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub records: Vec<FirmYearRecord>,
    /// Sorted by (infocode, date), unique on that pair.
    pub observations: Vec<TradingObservation>,
}

/// Counts produced by [`link_tables`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkageStats {
    pub worldscope_rows: usize,
    pub unlinked_rows: usize,
    pub without_market_data: usize,
    pub duplicate_observations: usize,
    pub records: usize,
    pub observations: usize,
}

pub fn link_tables(
    worldscope: Vec<WorldscopeRow>,
    link: &[LinkRow],
    observations: Vec<TradingObservation>,
    reporter: &dyn PipelineReporter,
) -> (Panel, LinkageStats) {
    reporter.stage_started(Stage::Linkage);
    let mut stats = LinkageStats {
        worldscope_rows: worldscope.len(),
        ..Default::default()
    };

    let mut links: BTreeMap<WsCode, BTreeSet<InfoCode>> = BTreeMap::new();
    for row in link {
        links.entry(row.code).or_default().insert(row.infocode);
    }

    let mut linked = Vec::with_capacity(worldscope.len());
    for row in worldscope {
        let Some(infocodes) = links.get(&row.code) else {
            stats.unlinked_rows += 1;
            continue;
        };
        for &infocode in infocodes {
            linked.push(FirmYearRecord {
                code: row.code,
                infocode,
                fiscal_year: row.fiscal_year,
                announcement_dates: row.announcement_dates,
                reported_annual_return: row.reported_annual_return,
            });
        }
    }
    reporter.note(
        Stage::Linkage,
        &format!("merged worldscope with link table: {} firm-years", linked.len()),
    );

    let (observations, duplicates) = dedup_observations(observations);
    stats.duplicate_observations = duplicates;

    let traded: BTreeSet<InfoCode> = observations.iter().map(|o| o.infocode).collect();
    let before = linked.len();
    linked.retain(|r| traded.contains(&r.infocode));
    stats.without_market_data = before - linked.len();

    let referenced: BTreeSet<InfoCode> = linked.iter().map(|r| r.infocode).collect();
    let observations: Vec<TradingObservation> = observations
        .into_iter()
        .filter(|o| referenced.contains(&o.infocode))
        .collect();

    stats.records = linked.len();
    stats.observations = observations.len();

    reporter.skipped(
        Stage::Linkage,
        SkipReason::Unlinked,
        stats.unlinked_rows,
        "worldscope firm-years without a link-table entry",
    );
    reporter.skipped(
        Stage::Linkage,
        SkipReason::Unlinked,
        stats.without_market_data,
        "linked firm-years without datastream observations",
    );
    reporter.skipped(
        Stage::Linkage,
        SkipReason::Duplicate,
        stats.duplicate_observations,
        "duplicate (infocode, date) observations removed",
    );
    reporter.stage_finished(Stage::Linkage, stats.records);

    (
        Panel {
            records: linked,
            observations,
        },
        stats,
    )
}

/// Sort by (infocode, date) and keep the first occurrence of each pair.
///
/// Returns the de-duplicated observations and the number removed.
pub fn dedup_observations(
    mut observations: Vec<TradingObservation>,
) -> (Vec<TradingObservation>, usize) {
    let before = observations.len();
    observations.sort_by_key(|o| (o.infocode, o.date));
    observations.dedup_by_key(|o| (o.infocode, o.date));
    let removed = before - observations.len();
    (observations, removed)
}
