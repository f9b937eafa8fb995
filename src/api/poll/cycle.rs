//! Per-cycle aggregation and the row handed to sinks.

use crate::protocol::cell::{response::ParsedResponse, CellId, CellSpec};

/// Value written for a cell that did not answer within its cycle.
pub const DEFAULT_VALUE: &str = "0";

/// Column layout of every row in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLayout {
    /// One column per requested cell, named after the cell.
    Cells(Vec<String>),
    /// A single aggregated column for custom-request mode.
    Values,
}

impl RowLayout {
    pub fn new(cells: &[CellSpec], custom: bool) -> Self {
        if custom {
            RowLayout::Values
        } else {
            RowLayout::Cells(cells.iter().map(|c| c.name.clone()).collect())
        }
    }

    /// `Time_ms,<name>,...` or `Time_ms,Values`
    pub fn header(&self) -> String {
        match self {
            RowLayout::Cells(names) => std::iter::once("Time_ms")
                .chain(names.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(","),
            RowLayout::Values => "Time_ms,Values".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellReading {
    pub name: String,
    pub id: CellId,
    pub value: String,
    pub answered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValues {
    Cells(Vec<CellReading>),
    Custom(Vec<ParsedResponse>),
}

/// A finished cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRow {
    pub timestamp_ms: u64,
    pub values: RowValues,
}

impl CycleRow {
    /// `name=value` pairs separated by spaces.
    pub fn summary(&self) -> String {
        match &self.values {
            RowValues::Cells(readings) => readings
                .iter()
                .map(|r| format!("{}={}", r.name, r.value))
                .collect::<Vec<_>>()
                .join(" "),
            RowValues::Custom(responses) if responses.is_empty() => "(no response)".to_string(),
            RowValues::Custom(responses) => responses
                .iter()
                .map(|r| format!("{}={}", r.cell, r.value))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Data fields in header order, timestamp first.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![self.timestamp_ms.to_string()];
        match &self.values {
            RowValues::Cells(readings) => {
                fields.extend(readings.iter().map(|r| r.value.clone()));
            }
            RowValues::Custom(responses) => fields.push(
                responses
                    .iter()
                    .map(|r| r.value.as_str())
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
        }
        fields
    }

    pub fn csv_line(&self) -> String {
        self.fields().join(",")
    }

    /// Value of the first column named `name`, cell mode only.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        match &self.values {
            RowValues::Cells(readings) => readings
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.value.as_str()),
            RowValues::Custom(_) => None,
        }
    }
}

#[derive(Debug)]
enum Slots {
    Cells(Vec<(CellSpec, Option<String>)>),
    Custom(Vec<ParsedResponse>),
}

/// A cycle under construction.
#[derive(Debug)]
pub struct PollCycle {
    started_ms: u64,
    slots: Slots,
}

impl PollCycle {
    pub fn for_cells(started_ms: u64, cells: &[CellSpec]) -> Self {
        Self {
            started_ms,
            slots: Slots::Cells(cells.iter().cloned().map(|c| (c, None)).collect()),
        }
    }

    pub fn for_custom(started_ms: u64) -> Self {
        Self {
            started_ms,
            slots: Slots::Custom(Vec::new()),
        }
    }

    pub fn started_ms(&self) -> u64 {
        self.started_ms
    }

    /// Apply one response. Later answers for the same cell replace earlier
    /// ones. Returns `false` if no requested cell took it.
    pub fn record(&mut self, response: ParsedResponse) -> bool {
        match &mut self.slots {
            Slots::Cells(slots) => {
                let mut taken = false;
                for (cell, value) in slots.iter_mut().filter(|(c, _)| c.id == response.cell) {
                    *value = Some(response.value.clone());
                    taken = true;
                    log::trace!("Cell {} <- {}", cell.name, response.value);
                }
                taken
            }
            Slots::Custom(responses) => {
                responses.push(response);
                true
            }
        }
    }

    pub fn finish(self) -> CycleRow {
        let values = match self.slots {
            Slots::Cells(slots) => RowValues::Cells(
                slots
                    .into_iter()
                    .map(|(cell, value)| {
                        if value.is_none() {
                            log::debug!(
                                "Cell {} (#{}) silent in cycle at {} ms, using {DEFAULT_VALUE}",
                                cell.name,
                                cell.id,
                                self.started_ms
                            );
                        }
                        CellReading {
                            answered: value.is_some(),
                            value: value.unwrap_or_else(|| DEFAULT_VALUE.to_string()),
                            name: cell.name,
                            id: cell.id,
                        }
                    })
                    .collect(),
            ),
            Slots::Custom(responses) => RowValues::Custom(responses),
        };
        CycleRow {
            timestamp_ms: self.started_ms,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(i: u32) -> CellSpec {
        CellSpec::new(CellId::new(i).unwrap())
    }

    fn resp(i: u32, v: &str) -> ParsedResponse {
        ParsedResponse::new(CellId::new(i).unwrap(), v)
    }

    #[test]
    fn missing_cells_default_to_zero() {
        let mut cycle = PollCycle::for_cells(2000, &[cell(1), cell(2), cell(3)]);
        assert!(cycle.record(resp(1, "10")));
        assert!(cycle.record(resp(2, "20")));
        let row = cycle.finish();
        assert_eq!(row.csv_line(), "2000,10,20,0");
        assert_eq!(row.summary(), "1=10 2=20 3=0");
        match &row.values {
            RowValues::Cells(r) => assert_eq!(
                r.iter().map(|c| c.answered).collect::<Vec<_>>(),
                vec![true, true, false]
            ),
            other => panic!("unexpected values {other:?}"),
        }
    }

    #[test]
    fn last_write_wins() {
        let mut cycle = PollCycle::for_cells(0, &[cell(4)]);
        cycle.record(resp(4, "1"));
        cycle.record(resp(4, "2"));
        cycle.record(resp(4, "3"));
        assert_eq!(cycle.finish().value_of("4"), Some("3"));
    }

    #[test]
    fn unrequested_cells_are_ignored() {
        let mut cycle = PollCycle::for_cells(0, &[cell(1)]);
        assert!(!cycle.record(resp(9, "99")));
        assert_eq!(cycle.finish().csv_line(), "0,0");
    }

    #[test]
    fn custom_mode_keeps_arrival_order() {
        let mut cycle = PollCycle::for_custom(1000);
        cycle.record(resp(10, "123"));
        cycle.record(resp(20, "432"));
        let row = cycle.finish();
        assert_eq!(row.csv_line(), "1000,123;432");
        assert_eq!(row.summary(), "10=123 20=432");
        assert_eq!(PollCycle::for_custom(5).finish().csv_line(), "5,");
    }

    #[test]
    fn headers() {
        let named = vec![CellSpec::named("temp", CellId::new(1).unwrap()), cell(2)];
        assert_eq!(RowLayout::new(&named, false).header(), "Time_ms,temp,2");
        assert_eq!(RowLayout::new(&named, true).header(), "Time_ms,Values");
    }
}
