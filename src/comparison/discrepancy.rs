//! Order-independent comparison of record sets.
//!
//! Servers commonly return the same RRset in a different order, so answers
//! are compared as sets of `TYPE:value` keys rather than position by
//! position. Every server is compared against the first one.

use crate::comparison::run::ServerResult;
use serde::Serialize;
use std::collections::BTreeSet;

/// How one server's answer differs from the reference (first) server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDiscrepancy {
    pub server: String,
    pub reference_server: String,
    pub record_count: usize,
    pub reference_record_count: usize,
    /// Keys the reference has and this server lacks
    pub missing: Vec<String>,
    /// Keys this server has and the reference lacks
    pub extra: Vec<String>,
}

fn record_keys(result: &ServerResult) -> BTreeSet<String> {
    result
        .response
        .records
        .iter()
        .map(|record| record.comparison_key())
        .collect()
}

/// `true` if any server disagrees with the first.
///
/// Fewer than two results can never disagree.
pub fn has_discrepancies(results: &[ServerResult]) -> bool {
    let Some((reference, others)) = results.split_first() else {
        return false;
    };
    let reference_count = reference.response.records.len();
    if others
        .iter()
        .any(|r| r.response.records.len() != reference_count)
    {
        return true;
    }

    let reference_keys = record_keys(reference);
    others.iter().any(|r| record_keys(r) != reference_keys)
}

/// Lists every server whose answer differs from the first server's.
pub fn detect_discrepancies(results: &[ServerResult]) -> Vec<ServerDiscrepancy> {
    let Some((reference, others)) = results.split_first() else {
        return Vec::new();
    };
    let reference_keys = record_keys(reference);
    let reference_count = reference.response.records.len();

    others
        .iter()
        .filter_map(|result| {
            let keys = record_keys(result);
            let record_count = result.response.records.len();
            if record_count == reference_count && keys == reference_keys {
                return None;
            }
            Some(ServerDiscrepancy {
                server: result.server.clone(),
                reference_server: reference.server.clone(),
                record_count,
                reference_record_count: reference_count,
                missing: reference_keys.difference(&keys).cloned().collect(),
                extra: keys.difference(&reference_keys).cloned().collect(),
            })
        })
        .collect()
}
