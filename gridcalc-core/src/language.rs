use chumsky::{prelude::*, primitive::empty};

use crate::{
    Config, Error,
    sheet::{Sheet, normalize_name},
};

pub(crate) type Extra<'src> = extra::Err<Rich<'src, char>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Max,
    Min,
}
impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Max => "max",
            Function::Min => "min",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    /// Reference to another cell by name, as written
    Cell(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// Built-in function, then arguments list
    Call(Function, Vec<Expr>),
}
impl Expr {
    pub fn neg(expr: Expr) -> Self {
        Self::Neg(Box::new(expr))
    }
    pub fn not(expr: Expr) -> Self {
        Self::Not(Box::new(expr))
    }
    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::Add(Box::new(lhs), Box::new(rhs))
    }
    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::Sub(Box::new(lhs), Box::new(rhs))
    }
    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::Mul(Box::new(lhs), Box::new(rhs))
    }
    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Self::Div(Box::new(lhs), Box::new(rhs))
    }
    pub fn equal(lhs: Expr, rhs: Expr) -> Self {
        Self::Eq(Box::new(lhs), Box::new(rhs))
    }
    pub fn less(lhs: Expr, rhs: Expr) -> Self {
        Self::Lt(Box::new(lhs), Box::new(rhs))
    }
    pub fn greater(lhs: Expr, rhs: Expr) -> Self {
        Self::Gt(Box::new(lhs), Box::new(rhs))
    }
    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }
    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::Or(Box::new(lhs), Box::new(rhs))
    }
}

/// Matches a word literally, ignoring ASCII case
///
/// Each character is checked on its own so a mismatch is reported where it happens. There is
/// no word boundary check, `or` matches the start of `orange`
fn keyword<'src>(word: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    word.chars()
        .fold(empty().boxed(), |prefix, expected| {
            prefix
                .then_ignore(any().filter(move |c: &char| c.eq_ignore_ascii_case(&expected)))
                .boxed()
        })
        .padded()
}

fn op<'src>(c: char) -> impl Parser<'src, &'src str, char, Extra<'src>> + Clone {
    just(c).padded()
}

/// Parses a whole formula into an expression. Leftover input is an error
pub(crate) fn parser<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> {
    let expr = recursive(|expr| {
        let digits = any().filter(|c: &char| c.is_ascii_digit()).repeated();

        // no sign and no exponent, a leading '-' belongs to the unary rule
        let num = choice((
            digits
                .clone()
                .at_least(1)
                .then(just('.').then(digits.clone()).or_not())
                .to_slice(),
            just('.').then(digits.at_least(1)).to_slice(),
        ))
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map(Expr::Number)
                .map_err(|e| Rich::custom(span, e))
        })
        .padded();

        let ident = any()
            .filter(|c: &char| c.is_alphabetic())
            .then(any().filter(|c: &char| c.is_alphanumeric()).repeated())
            .to_slice()
            .map(|name: &str| Expr::Cell(name.to_string()))
            .padded();

        let call = choice((
            keyword("max").to(Function::Max),
            keyword("min").to(Function::Min),
        ))
        .then(
            expr.clone()
                .then_ignore(op(','))
                .then(expr.clone())
                .delimited_by(op('('), op(')')),
        )
        .map(|(func, (lhs, rhs))| Expr::Call(func, vec![lhs, rhs]));

        let atom = choice((
            num,
            expr.clone().delimited_by(op('('), op(')')),
            call,
            ident,
        ));

        let unary = choice((
            keyword("not").to(Expr::not as fn(_) -> _),
            op('-').to(Expr::neg as fn(_) -> _),
        ))
        .repeated()
        .foldr(atom, |op, rhs| op(rhs));

        let product = unary.clone().foldl(
            choice((
                op('*').to(Expr::mul as fn(_, _) -> _),
                op('/').to(Expr::div as fn(_, _) -> _),
            ))
            .then(unary)
            .repeated(),
            |lhs, (op, rhs)| op(lhs, rhs),
        );

        let sum = product.clone().foldl(
            choice((
                op('+').to(Expr::add as fn(_, _) -> _),
                op('-').to(Expr::sub as fn(_, _) -> _),
            ))
            .then(product)
            .repeated(),
            |lhs, (op, rhs)| op(lhs, rhs),
        );

        // at most one comparison, `1 < 2 < 3` does not chain
        let relational = sum
            .clone()
            .then(
                choice((
                    op('=').to(Expr::equal as fn(_, _) -> _),
                    op('<').to(Expr::less as fn(_, _) -> _),
                    op('>').to(Expr::greater as fn(_, _) -> _),
                ))
                .then(sum)
                .or_not(),
            )
            .map(|(lhs, rest)| match rest {
                Some((op, rhs)) => op(lhs, rhs),
                None => lhs,
            });

        let and = relational
            .clone()
            .foldl(keyword("and").ignore_then(relational).repeated(), Expr::and);

        and.clone()
            .foldl(keyword("or").ignore_then(and).repeated(), Expr::or)
    });

    expr.then_ignore(end())
}

/// Parses the formula text, reporting the first error
pub(crate) fn parse(src: &str) -> Result<Expr, Error> {
    parse_with(&parser(), src)
}

/// Parses with an already built parser, so a recalculation pass builds the grammar only once
pub(crate) fn parse_with<'src>(
    parser: &impl Parser<'src, &'src str, Expr, Extra<'src>>,
    src: &'src str,
) -> Result<Expr, Error> {
    parser.parse(src).into_result().map_err(|errs| {
        let Some(err) = errs.into_iter().next() else {
            return Error::Syntax("invalid formula".to_string());
        };
        if err.span().start >= src.trim_end().len() {
            Error::UnexpectedEnd
        } else {
            Error::Syntax(err.to_string())
        }
    })
}

/// Parses and evaluates a formula, reading referenced cells from the sheet
pub(crate) fn evaluate(src: &str, sheet: &Sheet, config: &Config) -> Result<f64, Error> {
    evaluate_with(&parser(), src, sheet, config)
}

pub(crate) fn evaluate_with<'src>(
    parser: &impl Parser<'src, &'src str, Expr, Extra<'src>>,
    src: &'src str,
    sheet: &Sheet,
    config: &Config,
) -> Result<f64, Error> {
    let expr = parse_with(parser, src)?;
    eval(&expr, &EvalCtx { sheet, config })
}

/// Read-only view of everything an evaluation may look at
pub(crate) struct EvalCtx<'a> {
    pub sheet: &'a Sheet,
    pub config: &'a Config,
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub(crate) fn eval(expr: &Expr, ctx: &EvalCtx<'_>) -> Result<f64, Error> {
    match expr {
        Expr::Number(f) => Ok(*f),
        Expr::Cell(name) => ctx
            .sheet
            .value(name)
            .ok_or_else(|| Error::UnknownCell(normalize_name(name))),
        Expr::Neg(expr) => Ok(-eval(expr, ctx)?),
        Expr::Not(expr) => Ok(truth(eval(expr, ctx)? == 0.0)),
        Expr::Add(lhs, rhs) => Ok(eval(lhs, ctx)? + eval(rhs, ctx)?),
        Expr::Sub(lhs, rhs) => Ok(eval(lhs, ctx)? - eval(rhs, ctx)?),
        Expr::Mul(lhs, rhs) => Ok(eval(lhs, ctx)? * eval(rhs, ctx)?),
        // division by zero is left to IEEE 754
        Expr::Div(lhs, rhs) => Ok(eval(lhs, ctx)? / eval(rhs, ctx)?),
        Expr::Eq(lhs, rhs) => {
            let diff = eval(lhs, ctx)? - eval(rhs, ctx)?;
            Ok(truth(diff.abs() < ctx.config.equality_tolerance))
        }
        Expr::Lt(lhs, rhs) => Ok(truth(eval(lhs, ctx)? < eval(rhs, ctx)?)),
        Expr::Gt(lhs, rhs) => Ok(truth(eval(lhs, ctx)? > eval(rhs, ctx)?)),
        // both sides are always evaluated, an unknown cell on the right still fails
        Expr::And(lhs, rhs) => {
            let (lhs, rhs) = (eval(lhs, ctx)?, eval(rhs, ctx)?);
            Ok(truth(lhs != 0.0 && rhs != 0.0))
        }
        Expr::Or(lhs, rhs) => {
            let (lhs, rhs) = (eval(lhs, ctx)?, eval(rhs, ctx)?);
            Ok(truth(lhs != 0.0 || rhs != 0.0))
        }
        Expr::Call(func, args) => match func {
            Function::Max => functions::max(ctx, args),
            Function::Min => functions::min(ctx, args),
        },
    }
}

mod functions {
    use crate::{
        Error,
        language::{EvalCtx, Expr, Function, eval},
    };

    fn binary(
        ctx: &EvalCtx,
        func: Function,
        args: &[Expr],
        f: fn(f64, f64) -> f64,
    ) -> Result<f64, Error> {
        match args {
            [lhs, rhs] => {
                let (lhs, rhs) = (eval(lhs, ctx)?, eval(rhs, ctx)?);
                // f64::max and f64::min would hide a NaN argument
                if lhs.is_nan() || rhs.is_nan() {
                    Ok(f64::NAN)
                } else {
                    Ok(f(lhs, rhs))
                }
            }
            _ => Err(Error::Arity {
                function: func.name(),
                expected: 2,
                found: args.len(),
            }),
        }
    }

    pub fn max(ctx: &EvalCtx, args: &[Expr]) -> Result<f64, Error> {
        binary(ctx, Function::Max, args, f64::max)
    }

    pub fn min(ctx: &EvalCtx, args: &[Expr]) -> Result<f64, Error> {
        binary(ctx, Function::Min, args, f64::min)
    }
}
