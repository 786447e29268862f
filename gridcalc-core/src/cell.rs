use std::fmt;

use crate::formula::Formula;

/// Zero-based position of a cell in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellIdx {
    pub row: u64,
    pub col: u64,
}
impl CellIdx {
    pub fn new(row: u64, col: u64) -> Self {
        Self { row, col }
    }
}

/// Renders as the conventional cell name, `A1` for row 0, column 0
impl fmt::Display for CellIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col as usize), self.row + 1)
    }
}

/// A named slot in the sheet: the formula as last set, and the value from the last recalculation
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub formula: Formula,
    pub value: f64,
}
impl Cell {
    pub fn new(formula: Formula) -> Self {
        Self {
            formula,
            value: 0.0,
        }
    }
}
impl Default for Cell {
    fn default() -> Self {
        Self::new(Formula::default())
    }
}

/// Maps a zero-based column index to its letter name
///
/// `0` is `A` and `25` is `Z`. Past that the naming continues the way spreadsheets do,
/// so `26` is `AA`, `701` is `ZZ` and `702` is `AAA`
pub fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut rest = index + 1;
    while rest > 0 {
        rest -= 1;
        letters.push(b'A' + (rest % 26) as u8);
        rest /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Formats a computed value as locale-invariant text
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        // shortest representation that round-trips, never uses exponent notation
        value.to_string()
    }
}
