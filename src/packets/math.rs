use std::cmp::Ordering;

use anyhow::Result;
use tracing::{debug, warn};

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::{Value, loose_cmp, loose_eq};

/// Two-operand operators offered by the `binary` block, in palette order.
pub const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "&", "max", "min", "%", "==", "!=", ">", "<",
];

/// Aggregates offered by the `stat` block, in palette order.
pub const STAT_OPERATORS: &[&str] = &["max", "min", "sum", "avg", "stdev"];

pub fn compile_binary<B: BlockView>(b: &B) -> Result<Op> {
    let operator = compiler::field(b, "operator")?;
    if !BINARY_OPERATORS.contains(&operator.as_str()) {
        warn!(operator, "binary operator not in palette, it evaluates to unit");
    }
    Ok(Op::Binary {
        x: compiler::input(b, "x")?,
        y: compiler::input(b, "y")?,
        operator,
    })
}

/// Missing operands count as 0; an unknown operator yields unit.
pub fn binary(rt: &mut Runtime, frame: FrameId, x: &Link, y: &Link, operator: &str) -> Result<Value> {
    let a = match x {
        Some(n) => rt.eval(n, frame)?,
        None => Value::Num(0.0),
    };
    let b = match y {
        Some(n) => rt.eval(n, frame)?,
        None => Value::Num(0.0),
    };
    Ok(apply_binary(operator, &a, &b).unwrap_or_else(|| {
        debug!(operator, "unknown binary operator");
        Value::Unit
    }))
}

pub fn apply_binary(operator: &str, a: &Value, b: &Value) -> Option<Value> {
    let flag = |t: bool| Value::Num(if t { 1.0 } else { 0.0 });
    let out = match operator {
        "+" => Value::Num(a.to_num() + b.to_num()),
        "-" => Value::Num(a.to_num() - b.to_num()),
        "*" => Value::Num(a.to_num() * b.to_num()),
        "/" => Value::Num(a.to_num() / b.to_num()),
        "%" => Value::Num(a.to_num() % b.to_num()),
        "&" => Value::Str(format!("{a}{b}")),
        "max" => {
            if loose_cmp(a, b) == Some(Ordering::Greater) {
                a.clone()
            } else {
                b.clone()
            }
        }
        "min" => {
            if loose_cmp(a, b) == Some(Ordering::Greater) {
                b.clone()
            } else {
                a.clone()
            }
        }
        "==" => flag(loose_eq(a, b)),
        "!=" => flag(!loose_eq(a, b)),
        ">" => flag(loose_cmp(a, b) == Some(Ordering::Greater)),
        "<" => flag(loose_cmp(a, b) == Some(Ordering::Less)),
        _ => return None,
    };
    Some(out)
}

/// Aggregate a column. `None` for an unknown operator or an empty column.
///
/// `stdev` is the square root of the summed squared deviations from the
/// mean, without dividing by the count.
pub fn apply_stat(operator: &str, values: &[f64]) -> Option<f64> {
    if !STAT_OPERATORS.contains(&operator) || values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let out = match operator {
        "max" => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "min" => values.iter().copied().fold(f64::INFINITY, f64::min),
        "sum" => sum,
        "avg" => sum / values.len() as f64,
        _ => {
            let mean = sum / values.len() as f64;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>().sqrt()
        }
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: &str, a: impl Into<Value>, b: impl Into<Value>) -> Option<Value> {
        apply_binary(op, &a.into(), &b.into())
    }

    #[test]
    fn plus_coerces_and_ampersand_concatenates() {
        assert_eq!(bin("+", 2.0, "3"), Some(Value::Num(5.0)));
        assert_eq!(bin("&", 2.0, 3.0), Some(Value::from("23")));
        assert_eq!(bin("&", "a", 1.5), Some(Value::from("a1.5")));
    }

    #[test]
    fn arithmetic_table() {
        assert_eq!(bin("-", 7.0, "2"), Some(Value::Num(5.0)));
        assert_eq!(bin("*", "3", "4"), Some(Value::Num(12.0)));
        assert_eq!(bin("/", 1.0, 4.0), Some(Value::Num(0.25)));
        assert_eq!(bin("%", -7.0, 3.0), Some(Value::Num(-1.0)));
        assert_eq!(bin("/", 1.0, 0.0), Some(Value::Num(f64::INFINITY)));
    }

    #[test]
    fn max_min_keep_the_original_operand() {
        assert_eq!(bin("max", 2.0, "10"), Some(Value::from("10")));
        assert_eq!(bin("min", 2.0, "10"), Some(Value::Num(2.0)));
        // text against text compares lexically
        assert_eq!(bin("max", "2", "10"), Some(Value::from("2")));
    }

    #[test]
    fn comparisons_yield_one_or_zero() {
        assert_eq!(bin("==", 2.0, "2"), Some(Value::Num(1.0)));
        assert_eq!(bin("!=", 2.0, "2"), Some(Value::Num(0.0)));
        assert_eq!(bin(">", 3.0, 2.0), Some(Value::Num(1.0)));
        assert_eq!(bin("<", 3.0, 2.0), Some(Value::Num(0.0)));
        assert_eq!(bin("<", "x", 2.0), Some(Value::Num(0.0)));
    }

    #[test]
    fn unknown_operator_is_none() {
        assert_eq!(bin("^", 1.0, 2.0), None);
    }

    #[test]
    fn stats_over_columns() {
        assert_eq!(apply_stat("avg", &[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(apply_stat("sum", &[1.0, 2.0, 3.0]), Some(6.0));
        assert_eq!(apply_stat("max", &[1.0, 5.0, 3.0]), Some(5.0));
        assert_eq!(apply_stat("min", &[4.0, 5.0, 3.0]), Some(3.0));
        assert_eq!(apply_stat("stdev", &[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(apply_stat("stdev", &[1.0, 2.0, 3.0]), Some(2f64.sqrt()));
        assert_eq!(apply_stat("median", &[1.0]), None);
        assert_eq!(apply_stat("sum", &[]), None);
    }
}
