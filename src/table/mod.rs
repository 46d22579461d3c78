//! Table detection inside loosely structured sheets
//!
//! Two heuristics recover tables from a [`Grid`](crate::spreadsheet::grid::Grid):
//! density based segmentation ([`segment`]) and marker anchored header lookup ([`marker`]).
//! Either way the result is materialized as a [`resolved::ResolvedTable`].

pub(crate) mod marker;
pub(crate) mod resolved;
pub(crate) mod segment;
