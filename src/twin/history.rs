use crate::simulation::ParameterMap;
use std::collections::BTreeMap;

/// Bounded time-series history of a twin.
///
/// Every series is kept the same length as `timestamps`. When the history
/// grows past `max_points` it is cut back to the most recent half in one go,
/// so trimming cost is amortized over many steps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TwinHistory {
    max_points: usize,
    timestamps: Vec<f64>,
    parameters: BTreeMap<String, Vec<f64>>,
    sensors: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
}

/// Copy of a time window of the history
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistorySlice {
    pub timestamps: Vec<f64>,
    pub parameters: BTreeMap<String, Vec<f64>>,
    pub sensors: BTreeMap<String, Vec<f64>>,
    pub metrics: BTreeMap<String, Vec<f64>>,
}

impl TwinHistory {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn parameters(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.parameters
    }

    pub fn sensors(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.sensors
    }

    pub fn metrics(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.metrics
    }

    /// Append one observation. Returns true when the append triggered a trim.
    pub fn record(
        &mut self,
        timestamp: f64,
        parameters: &ParameterMap,
        sensors: &ParameterMap,
        metrics: &ParameterMap,
    ) -> bool {
        let len = self.timestamps.len();
        push_series(&mut self.parameters, parameters, len);
        push_series(&mut self.sensors, sensors, len);
        push_series(&mut self.metrics, metrics, len);
        self.timestamps.push(timestamp);

        if self.timestamps.len() > self.max_points {
            self.trim();
            true
        } else {
            false
        }
    }

    /// Keep the most recent `max_points / 2` entries of every series
    fn trim(&mut self) {
        let keep = (self.max_points / 2).max(1);
        let drop = self.timestamps.len().saturating_sub(keep);
        if drop == 0 {
            return;
        }
        self.timestamps.drain(..drop);
        for series in self
            .parameters
            .values_mut()
            .chain(self.sensors.values_mut())
            .chain(self.metrics.values_mut())
        {
            series.drain(..drop);
        }
    }

    /// Entries with `start <= t <= end`
    pub fn slice(&self, start: f64, end: f64) -> HistorySlice {
        // Timestamps are appended in increasing order
        let lo = self.timestamps.partition_point(|&t| t < start);
        let hi = self.timestamps.partition_point(|&t| t <= end).max(lo);

        let cut = |series: &BTreeMap<String, Vec<f64>>| {
            series
                .iter()
                .map(|(name, values)| (name.clone(), values[lo..hi].to_vec()))
                .collect()
        };

        HistorySlice {
            timestamps: self.timestamps[lo..hi].to_vec(),
            parameters: cut(&self.parameters),
            sensors: cut(&self.sensors),
            metrics: cut(&self.metrics),
        }
    }
}

/// Append one value per series, keeping all series `len + 1` long.
///
/// A series seen for the first time is back-filled with its first value;
/// a series missing from `values` repeats its last value.
fn push_series(series: &mut BTreeMap<String, Vec<f64>>, values: &ParameterMap, len: usize) {
    for (name, &value) in values {
        series
            .entry(name.clone())
            .or_insert_with(|| vec![value; len])
            .push(value);
    }
    for values_so_far in series.values_mut() {
        if values_so_far.len() == len {
            if let Some(&last) = values_so_far.last() {
                values_so_far.push(last);
            }
        }
    }
}
