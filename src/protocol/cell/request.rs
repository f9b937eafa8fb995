//! Outbound request encoding.
//!
//! Cell mode sends `?<addr>\n` for every requested cell; custom mode sends
//! one literal line per cycle and ignores the cell list.

use super::{CellId, CellSpec};

/// What gets written to the port at the start of every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    Cells(Vec<CellId>),
    Custom(String),
}

impl RequestPlan {
    /// Build the plan from the configured cells, letting a custom literal win.
    pub fn new(cells: &[CellSpec], custom: Option<&str>) -> Self {
        match custom {
            Some(literal) => RequestPlan::Custom(literal.to_string()),
            None => RequestPlan::Cells(cells.iter().map(|c| c.id).collect()),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, RequestPlan::Custom(_))
    }

    /// Frames for one cycle, in send order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        match self {
            RequestPlan::Cells(ids) => ids.iter().map(|id| cell_query(*id)).collect(),
            RequestPlan::Custom(literal) => vec![custom_query(literal)],
        }
    }
}

/// `?<addr>\n`
pub fn cell_query(id: CellId) -> Vec<u8> {
    format!("?{id}\n").into_bytes()
}

/// The literal as given, newline-terminated.
pub fn custom_query(literal: &str) -> Vec<u8> {
    let mut bytes = literal.as_bytes().to_vec();
    if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }
    bytes
}
