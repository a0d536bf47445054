//! Scenario generators: additive temperature shifts on a fitted seasonal curve
//! and month-pooled rainfall resampling.
//!
//! Both produce long-format [`ScenarioSeries`] rows; [`pivot_wide`] turns them
//! into one column per scenario.

pub mod rainfall;
pub mod temperature;

pub use rainfall::*;
pub use temperature::*;

use serde::{Deserialize, Serialize};

use crate::domain::TimeKey;

/// Label of the unmodified series in every scenario output.
pub const BASELINE: &str = "baseline";

/// One `(time key, scenario)` observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSeries {
    pub key: TimeKey,
    pub scenario: String,
    pub value: f64,
}

/// Wide layout: one row per time key, one column per scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    pub scenarios: Vec<String>,
    pub keys: Vec<TimeKey>,
    /// `values[row][column]`; NaN where a scenario has no value for a key.
    pub values: Vec<Vec<f64>>,
}

impl WideTable {
    pub fn column(&self, scenario: &str) -> Option<Vec<f64>> {
        let j = self.scenarios.iter().position(|s| s == scenario)?;
        Some(self.values.iter().map(|row| row[j]).collect())
    }
}

/// Pivot long rows into a [`WideTable`].
///
/// Scenario columns and key rows keep their order of first appearance.
pub fn pivot_wide(series: &[ScenarioSeries]) -> WideTable {
    let mut scenarios: Vec<String> = Vec::new();
    let mut keys: Vec<TimeKey> = Vec::new();
    let mut cells: Vec<(usize, usize, f64)> = Vec::with_capacity(series.len());

    for s in series {
        let col = match scenarios.iter().position(|name| *name == s.scenario) {
            Some(j) => j,
            None => {
                scenarios.push(s.scenario.clone());
                scenarios.len() - 1
            }
        };
        let row = match keys.iter().position(|k| *k == s.key) {
            Some(i) => i,
            None => {
                keys.push(s.key);
                keys.len() - 1
            }
        };
        cells.push((row, col, s.value));
    }

    let mut values = vec![vec![f64::NAN; scenarios.len()]; keys.len()];
    for (row, col, value) in cells {
        values[row][col] = value;
    }
    WideTable {
        scenarios,
        keys,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, scenario: &str, value: f64) -> ScenarioSeries {
        ScenarioSeries {
            key: TimeKey::DayOfYear(day),
            scenario: scenario.to_string(),
            value,
        }
    }

    #[test]
    fn pivot_keeps_first_appearance_order() {
        let long = vec![
            row(1, BASELINE, 10.0),
            row(2, BASELINE, 11.0),
            row(1, "+1", 11.0),
            row(2, "+1", 12.0),
            row(3, "+1", 13.0),
        ];
        let wide = pivot_wide(&long);
        assert_eq!(wide.scenarios, vec![BASELINE, "+1"]);
        assert_eq!(wide.keys.len(), 3);
        assert_eq!(wide.values[1], vec![11.0, 12.0]);
        assert!(wide.values[2][0].is_nan());
        assert_eq!(wide.column("+1"), Some(vec![11.0, 12.0, 13.0]));
    }
}
