//! Domain events
use crate::domain::value_objects::LineId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    ItemAdded { line_id: LineId, quantity: u32, merged: bool },
    QuantityChanged { line_id: LineId, from: u32, to: u32 },
    ItemRemoved { line_id: LineId },
    Cleared { lines: usize },
}
