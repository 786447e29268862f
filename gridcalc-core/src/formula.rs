use chumsky::Parser;

use crate::{
    Config, Error,
    language::{self, Expr, Extra},
    sheet::Sheet,
};

/// The raw text of a cell's formula
///
/// Nothing is validated when a formula is stored, it is parsed again on every recalculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formula {
    pub script: String,
}
impl Formula {
    pub fn new(script: impl ToString) -> Self {
        Self {
            script: script.to_string(),
        }
    }

    /// Empty or whitespace only, which evaluates to 0 without parsing
    pub fn is_blank(&self) -> bool {
        self.script.trim().is_empty()
    }

    /// Evaluate the formula against the current values of the sheet
    pub fn eval(&self, sheet: &Sheet, config: &Config) -> Result<f64, Error> {
        if self.is_blank() {
            return Ok(0.0);
        }
        language::evaluate(&self.script, sheet, config)
    }

    /// Same as [Formula::eval] but with a parser built by the caller
    pub(crate) fn eval_with<'src>(
        &'src self,
        parser: &impl Parser<'src, &'src str, Expr, Extra<'src>>,
        sheet: &Sheet,
        config: &Config,
    ) -> Result<f64, Error> {
        if self.is_blank() {
            return Ok(0.0);
        }
        language::evaluate_with(parser, &self.script, sheet, config)
    }
}

impl From<&str> for Formula {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Formula {
    fn from(script: String) -> Self {
        Self { script }
    }
}
