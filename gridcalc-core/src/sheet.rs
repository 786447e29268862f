use std::collections::BTreeMap;

use crate::{
    cell::{Cell, format_value},
    formula::Formula,
};

/// Normalizes a cell name for storage and lookup
///
/// Names are case-insensitive, so `a1` and `A1` address the same cell
pub fn normalize_name(name: &str) -> String {
    name.to_uppercase()
}

/// The cell store, a mapping from normalized cell name to cell
///
/// Cells are created lazily the first time a formula is set for them and are never removed.
/// Any string is accepted as a name, the `<column><row>` shape is only a convention
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: BTreeMap<String, Cell>,
}
impl Sheet {
    pub fn new() -> Self {
        Self {
            cells: Default::default(),
        }
    }

    /// Sets the formula of a cell, creating the cell if needed
    ///
    /// Returns the previous formula
    pub fn set_formula(&mut self, name: &str, formula: impl Into<Formula>) -> Formula {
        let cell = self.cells.entry(normalize_name(name)).or_default();
        std::mem::replace(&mut cell.formula, formula.into())
    }

    /// Returns the stored formula text, empty if the cell is unknown
    pub fn get_formula(&self, name: &str) -> &str {
        self.get(name)
            .map(|c| c.formula.script.as_str())
            .unwrap_or_default()
    }

    /// Returns the stored value as invariant text, empty if the cell is unknown
    pub fn get_value(&self, name: &str) -> String {
        self.value(name).map(format_value).unwrap_or_default()
    }

    /// Returns the stored numeric value, if the cell exists
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|c| c.value)
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cells.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cells.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates the cells in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    /// Overwrites the value of an existing cell. Only recalculation writes values
    pub(crate) fn store_value(&mut self, name: &str, value: f64) {
        if let Some(cell) = self.cells.get_mut(&normalize_name(name)) {
            cell.value = value;
        }
    }
}
