use std::collections::BTreeMap;

use serde::Serialize;

/// One recorded collision attributed to a turbine.
///
/// `hour` is the cumulative step count modulo 24. Steps are months, so this is
/// a synthetic slot rather than a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurtailmentEntry {
    pub month: u32,
    pub hour: u32,
}

/// Shutdown recommendations keyed by turbine index. Turbines without a
/// recorded collision have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CurtailmentSchedule {
    entries: BTreeMap<usize, Vec<CurtailmentEntry>>,
}

impl CurtailmentSchedule {
    pub fn record(&mut self, turbine: usize, month: u32, step: u64) {
        let hour = (step % 24) as u32;
        self.entries
            .entry(turbine)
            .or_default()
            .push(CurtailmentEntry { month, hour });
    }

    pub fn for_turbine(&self, turbine: usize) -> &[CurtailmentEntry] {
        self.entries
            .get(&turbine)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn turbines(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn total_events(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
