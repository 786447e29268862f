use crate::sheet::Sheet;

pub mod cell;
pub mod formula;
mod language;
pub mod sheet;

pub use cell::{CellIdx, column_name, format_value};

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Largest absolute difference `=` still treats as equal
    pub equality_tolerance: f64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            equality_tolerance: 1e-6,
        }
    }
}

/// Why a formula could not be evaluated
///
/// A recalculation pass turns any of these into a NaN value for the failing cell
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Unexpected token, missing parenthesis or trailing input
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unknown cell `{0}`")]
    UnknownCell(String),
    #[error("`{function}` takes {expected} arguments, got {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },
}

/// A sheet of formulas and the values last computed from them
#[derive(Debug, Default)]
pub struct Spreadsheet {
    sheet: Sheet,
    config: Config,
}
impl Spreadsheet {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            sheet: Sheet::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read-only access to the cell store
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Stores the formula text for a cell, creating the cell if needed
    ///
    /// The text is not checked here, errors only show up as NaN after recalculation
    pub fn set_formula(&mut self, name: &str, formula: impl ToString) {
        self.sheet.set_formula(name, formula.to_string());
    }

    /// Returns the formula text of a cell, empty if the cell is unknown
    pub fn get_formula(&self, name: &str) -> &str {
        self.sheet.get_formula(name)
    }

    /// Returns the value of a cell as invariant text, empty if the cell is unknown
    ///
    /// A failed evaluation reads as `NaN`
    pub fn get_value(&self, name: &str) -> String {
        self.sheet.get_value(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.sheet.value(name)
    }

    /// Evaluates formula text against the values currently in the sheet
    pub fn evaluate(&self, formula: &str) -> Result<f64, Error> {
        language::evaluate(formula, &self.sheet, &self.config)
    }

    /// Recomputes every cell from its formula
    ///
    /// Cells are visited in name order and each result is stored before the next cell is
    /// evaluated. References are not followed transitively, so a cell that reads a cell visited
    /// later in the pass sees that cell's value from before the pass. A failing cell becomes NaN
    /// and the pass carries on.
    ///
    /// Parsing recurses once per nesting level. Unoptimized builds use a lot of stack per level,
    /// so formulas nested a few dozen parentheses deep can overflow a 2 MiB thread stack there.
    pub fn recalculate_all(&mut self) {
        let formulas = self
            .sheet
            .iter()
            .map(|(name, cell)| (name.to_string(), cell.formula.clone()))
            .collect::<Vec<_>>();

        let parser = language::parser();
        let mut failed = 0;
        for (name, formula) in &formulas {
            let value = match formula.eval_with(&parser, &self.sheet, &self.config) {
                Ok(value) => value,
                Err(e) => {
                    log::trace!("cell {name} failed to evaluate: {e}");
                    failed += 1;
                    f64::NAN
                }
            };
            self.sheet.store_value(name, value);
        }

        log::debug!(
            "recalculated {} cells, {failed} failed to evaluate",
            formulas.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{CellIdx, Config, Error, Spreadsheet, column_name};

    #[test]
    fn big_test() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "5");
        ss.set_formula("A2", "A1 * 2");
        ss.set_formula("A3", "max(A1, A2) > 7 and not (A1 = 4)");
        ss.set_formula("B1", "");

        ss.recalculate_all();

        assert_eq!(ss.get_value("A1"), "5");
        assert_eq!(ss.get_value("A2"), "10");
        assert_eq!(ss.get_value("A3"), "1");
        assert_eq!(ss.get_value("B1"), "0");
        assert_eq!(ss.get_formula("A2"), "A1 * 2");
    }

    #[test]
    fn unknown_cells() {
        let ss = Spreadsheet::new();
        assert_eq!(ss.get_formula("C3"), "");
        assert_eq!(ss.get_value("C3"), "");
        assert_eq!(ss.value("C3"), None);
    }

    #[test]
    fn set_formula_defers_evaluation() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "1 +* 2");
        assert_eq!(ss.get_formula("A1"), "1 +* 2");
        assert_eq!(ss.get_value("A1"), "0");

        ss.recalculate_all();
        assert_eq!(ss.get_value("A1"), "NaN");
    }

    #[test]
    fn failures_do_not_stop_the_pass() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "B99+1");
        ss.set_formula("A2", "1+1 foo");
        ss.set_formula("A3", "(1");
        ss.set_formula("A4", "2+3*4");

        ss.recalculate_all();

        assert_eq!(ss.get_value("A1"), "NaN");
        assert_eq!(ss.get_value("A2"), "NaN");
        assert_eq!(ss.get_value("A3"), "NaN");
        assert_eq!(ss.get_value("A4"), "14");
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("a1", "5");
        ss.set_formula("B1", "a1*2");
        ss.set_formula("C1", "A1*2");

        ss.recalculate_all();

        assert_eq!(ss.get_value("A1"), "5");
        assert_eq!(ss.get_value("b1"), "10");
        assert_eq!(ss.get_value("C1"), "10");
    }

    #[test]
    fn later_cells_are_stale() {
        let mut ss = Spreadsheet::new();
        // B1 is visited after A1, so A1 reads the value B1 had before the pass
        ss.set_formula("A1", "B1 + 1");
        ss.set_formula("B1", "7");

        ss.recalculate_all();
        assert_eq!(ss.get_value("A1"), "1");
        assert_eq!(ss.get_value("B1"), "7");

        ss.recalculate_all();
        assert_eq!(ss.get_value("A1"), "8");
    }

    #[test]
    fn cycles_terminate() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "B1 + 1");
        ss.set_formula("B1", "A1 + 1");

        ss.recalculate_all();
        assert_eq!(ss.get_value("A1"), "1");
        assert_eq!(ss.get_value("B1"), "2");

        ss.recalculate_all();
        assert_eq!(ss.get_value("A1"), "3");
        assert_eq!(ss.get_value("B1"), "4");
    }

    #[test]
    fn recalculation_is_idempotent_at_a_fixed_point() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "3");
        ss.set_formula("A2", "A1 / 4");
        ss.set_formula("A3", "min(A1, A2) - 1");
        ss.set_formula("A4", "nope");

        ss.recalculate_all();
        let first = ["A1", "A2", "A3", "A4"].map(|n| ss.get_value(n));
        ss.recalculate_all();
        let second = ["A1", "A2", "A3", "A4"].map(|n| ss.get_value(n));

        assert_eq!(first, ["3", "0.75", "-0.25", "NaN"].map(String::from));
        assert_eq!(first, second);
    }

    #[test]
    fn infinities_are_stored() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "1/0");
        ss.set_formula("A2", "-1/0");
        ss.set_formula("A3", "0/0");
        ss.set_formula("A4", "1/0 > 5");

        ss.recalculate_all();

        assert_eq!(ss.get_value("A1"), "Infinity");
        assert_eq!(ss.get_value("A2"), "-Infinity");
        assert_eq!(ss.get_value("A3"), "NaN");
        assert_eq!(ss.get_value("A4"), "1");
    }

    #[test]
    fn evaluate_reads_current_values() {
        let mut ss = Spreadsheet::new();
        ss.set_formula("A1", "5");
        assert_eq!(ss.evaluate("A1*2"), Ok(0.0));

        ss.recalculate_all();
        assert_eq!(ss.evaluate("A1*2"), Ok(10.0));
        assert_eq!(ss.evaluate("a1*2"), Ok(10.0));
        assert_eq!(
            ss.evaluate("B99+1"),
            Err(Error::UnknownCell("B99".to_string()))
        );
        assert_eq!(ss.evaluate(""), Err(Error::UnexpectedEnd));
    }

    #[test]
    fn grid_addressing() {
        let mut ss = Spreadsheet::new();
        for col in 0..3 {
            for row in 0..2 {
                let name = CellIdx::new(row, col).to_string();
                ss.set_formula(&name, format!("{col} * 10 + {row}"));
            }
        }
        ss.set_formula("D1", "C2 + A1");

        ss.recalculate_all();

        assert_eq!(column_name(2), "C");
        assert_eq!(ss.get_value("C2"), "21");
        assert_eq!(ss.get_value("D1"), "21");
    }

    #[test]
    fn custom_tolerance() {
        let mut ss = Spreadsheet::with_config(Config {
            equality_tolerance: 0.01,
        });
        ss.set_formula("A1", "1 = 1.005");
        ss.set_formula("A2", "1 = 1.05");

        ss.recalculate_all();

        assert_eq!(ss.get_value("A1"), "1");
        assert_eq!(ss.get_value("A2"), "0");
    }
}
