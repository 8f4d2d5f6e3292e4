//! Seeding a run with observations from an earlier one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use fo_types::{FoResult, History, Observation};

use crate::space::{ParameterValue, SearchSpace};

/// One evaluated parameter combination, keyed by dimension name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDataRow {
    pub values: HashMap<String, ParameterValue>,
    pub score: f64,
}

/// Append a copy of `source` to `target`; returns how many were copied.
pub fn import_history(target: &mut History, source: &History) -> usize {
    target.extend_from(source);
    info!("Warm start imported {} observations", source.len());
    source.len()
}

/// Translate exported search data into positions of `space`.
///
/// Rows whose values are not part of the space, or whose score is not
/// finite, are skipped.
pub fn history_from_search_data(space: &SearchSpace, rows: &[SearchDataRow]) -> History {
    let mut history = History::new();
    for (i, row) in rows.iter().enumerate() {
        if !row.score.is_finite() {
            warn!("Skipping search data row {}: score {} is not finite", i, row.score);
            continue;
        }
        match space.position_of(&row.values) {
            Some(position) => history.push(Observation::new(position, row.score)),
            None => warn!("Skipping search data row {}: values are outside the search space", i),
        }
    }
    history
}

/// Export a history as named parameter values.
pub fn search_data_from_history(space: &SearchSpace, history: &History) -> FoResult<Vec<SearchDataRow>> {
    history
        .iter()
        .map(|obs| {
            Ok(SearchDataRow {
                values: space.values_at(&obs.position)?,
                score: obs.score,
            })
        })
        .collect()
}
