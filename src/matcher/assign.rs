//! Pairs detected names with candidate values.
//!
//! Strategies run in the configured order and only ever see names and values
//! that earlier strategies left unresolved.

use std::collections::HashMap;

use super::tokens::{group_digits, name_key, AssignmentRecord, CandidateName, CandidateValue};
use crate::config::{RosterEntry, Strategy};
use crate::{log, log_debug};

/// Known totals (and known misreadings of them) mapped to the owning name.
#[derive(Debug, Default)]
pub struct ExactTable {
    entries: HashMap<u32, String>,
}

impl ExactTable {
    pub fn from_roster(roster: &[RosterEntry]) -> Self {
        let mut entries = HashMap::new();
        for entry in roster {
            for &total in &entry.known_totals {
                entries.entry(total).or_insert_with(|| name_key(&entry.name));
            }
        }
        Self { entries }
    }

    /// Returns the name key owning `value`, if any.
    pub fn lookup(&self, value: u32) -> Option<&str> {
        self.entries.get(&value).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct AssignOptions {
    pub strategies: Vec<Strategy>,
    /// Emit a detected but unmatched name with its expected total
    pub fill_missing_with_expected: bool,
    /// Proximity never pairs a name and value further apart vertically
    pub max_row_distance: Option<u32>,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self {
            strategies: vec![Strategy::ExactTable, Strategy::RangeNearest, Strategy::Proximity],
            fill_missing_with_expected: false,
            max_row_distance: None,
        }
    }
}

/// Working state of one assignment run.
struct Assignment<'a> {
    names: &'a [CandidateName],
    values: &'a [CandidateValue],
    resolved: Vec<bool>,
    used: Vec<bool>,
    /// (name index, value index) in the order they were paired
    pairs: Vec<(usize, usize)>,
}

impl<'a> Assignment<'a> {
    fn new(names: &'a [CandidateName], values: &'a [CandidateValue]) -> Self {
        Self {
            names,
            values,
            resolved: vec![false; names.len()],
            used: vec![false; values.len()],
            pairs: Vec::new(),
        }
    }

    fn pair(&mut self, name_idx: usize, value_idx: usize) {
        self.resolved[name_idx] = true;
        self.used[value_idx] = true;
        self.pairs.push((name_idx, value_idx));
    }

    fn unused_values(&self) -> impl Iterator<Item = (usize, &'a CandidateValue)> + '_ {
        let values = self.values;
        values
            .iter()
            .enumerate()
            .filter(move |(idx, _)| !self.used[*idx])
    }

    fn exact_table(&mut self, table: &ExactTable) {
        let (names, values) = (self.names, self.values);
        for (value_idx, candidate) in values.iter().enumerate() {
            if self.used[value_idx] {
                continue;
            }
            let Some(owner) = table.lookup(candidate.value) else {
                continue;
            };
            let name_idx = names
                .iter()
                .enumerate()
                .position(|(idx, n)| !self.resolved[idx] && name_key(&n.name) == owner);

            if let Some(name_idx) = name_idx {
                log_debug(&format!(
                    "EXACT MATCH: {} -> {}",
                    names[name_idx].name, candidate.display
                ));
                self.pair(name_idx, value_idx);
            }
        }
    }

    fn range_nearest(&mut self) {
        let (names, values) = (self.names, self.values);
        for (name_idx, name) in names.iter().enumerate() {
            if self.resolved[name_idx] {
                continue;
            }
            let Some(range) = name.range else {
                continue;
            };

            let best = self
                .unused_values()
                .min_by_key(|(_, c)| {
                    let to_expected = name.expected.map_or(0, |e| e.abs_diff(c.value));
                    (range.distance(c.value), to_expected)
                })
                .map(|(idx, _)| idx);

            if let Some(value_idx) = best {
                log_debug(&format!(
                    "CLOSEST MATCH: {} -> {} (range {}-{})",
                    name.name, values[value_idx].display, range.min, range.max
                ));
                self.pair(name_idx, value_idx);
            }
        }
    }

    fn proximity(&mut self, max_row_distance: Option<u32>) {
        let (names, values) = (self.names, self.values);
        for (name_idx, name) in names.iter().enumerate() {
            if self.resolved[name_idx] {
                continue;
            }
            let Some(at) = name.position else {
                continue;
            };

            let best = self
                .unused_values()
                .filter_map(|(idx, c)| {
                    let pos = c.position?;
                    let chunk_distance = at.chunk.abs_diff(pos.chunk);
                    let y_distance = at.y.abs_diff(pos.y);
                    let in_reach = chunk_distance <= 1
                        && max_row_distance.is_none_or(|max| y_distance <= max);
                    in_reach.then_some((idx, (chunk_distance, y_distance)))
                })
                .min_by_key(|&(_, distance)| distance)
                .map(|(idx, _)| idx);

            if let Some(value_idx) = best {
                log_debug(&format!(
                    "Matched: {} -> {}",
                    name.name, values[value_idx].display
                ));
                self.pair(name_idx, value_idx);
            }
        }
    }

    fn into_records(self, fill_missing_with_expected: bool) -> Vec<AssignmentRecord> {
        let mut records: Vec<AssignmentRecord> = self
            .pairs
            .iter()
            .map(|&(n, v)| AssignmentRecord::new(&self.names[n].name, &self.values[v].display))
            .collect();

        if fill_missing_with_expected {
            for (idx, name) in self.names.iter().enumerate() {
                if self.resolved[idx] {
                    continue;
                }
                if let Some(expected) = name.expected {
                    log(&format!(
                        "Warning: no value found for {}, using expected {}",
                        name.name,
                        group_digits(expected)
                    ));
                    records.push(AssignmentRecord::new(&name.name, group_digits(expected)));
                }
            }
        }

        dedup_records(records)
    }
}

/// Runs the strategies in order and returns records in the order they were
/// resolved.
pub fn assign(
    names: &[CandidateName],
    values: &[CandidateValue],
    table: &ExactTable,
    options: &AssignOptions,
) -> Vec<AssignmentRecord> {
    let mut state = Assignment::new(names, values);

    for strategy in &options.strategies {
        match strategy {
            Strategy::ExactTable => state.exact_table(table),
            Strategy::RangeNearest => state.range_nearest(),
            Strategy::Proximity => state.proximity(options.max_row_distance),
        }
    }

    state.into_records(options.fill_missing_with_expected)
}

/// Keeps the first record per case/space-insensitive name.
pub fn dedup_records(records: Vec<AssignmentRecord>) -> Vec<AssignmentRecord> {
    let mut seen: Vec<String> = Vec::new();
    records
        .into_iter()
        .filter(|r| {
            let key = name_key(&r.name);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}
