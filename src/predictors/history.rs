use serde::Deserialize;

use crate::error::SimError;

/// One historical charging session used to fit and sample predictors.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HistoryRecord {
    /// SOC at plug-in (0-100).
    pub start_soc: f64,
    /// SOC added by the session (percentage points).
    pub delta_soc: f64,
}

/// Non-empty set of historical charging sessions.
#[derive(Debug, Clone)]
pub struct ChargingHistory {
    records: Vec<HistoryRecord>,
}

impl ChargingHistory {
    /// Wraps historical records, discarding rows with non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyHistory`] when no usable record remains.
    pub fn new(records: Vec<HistoryRecord>) -> Result<Self, SimError> {
        let records: Vec<HistoryRecord> = records
            .into_iter()
            .filter(|r| r.start_soc.is_finite() && r.delta_soc.is_finite())
            .collect();
        if records.is_empty() {
            return Err(SimError::EmptyHistory);
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn start_socs(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.start_soc)
    }

    pub fn delta_socs(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.delta_soc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_rejected() {
        assert!(matches!(
            ChargingHistory::new(Vec::new()),
            Err(SimError::EmptyHistory)
        ));
    }

    #[test]
    fn non_finite_rows_are_dropped() {
        let history = ChargingHistory::new(vec![
            HistoryRecord {
                start_soc: 20.0,
                delta_soc: 50.0,
            },
            HistoryRecord {
                start_soc: f64::NAN,
                delta_soc: 10.0,
            },
        ])
        .expect("one usable record");
        assert_eq!(history.len(), 1);
        assert_eq!(history.start_socs().collect::<Vec<_>>(), vec![20.0]);
    }
}
