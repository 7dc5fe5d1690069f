use anyhow::Result;
use tracing::debug;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::error::ChartError;
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::Value;
use crate::packets::math::{STAT_OPERATORS, apply_stat};

pub fn compile_cell<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Cell {
        row: compiler::input(b, "row")?,
        column: compiler::input(b, "column")?,
    })
}

pub fn compile_column_name<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::ColumnName {
        index: compiler::input(b, "index")?,
    })
}

pub fn compile_stat<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Stat {
        column: compiler::input(b, "column")?,
        operator: compiler::field(b, "operator")?,
    })
}

pub fn cell(rt: &mut Runtime, frame: FrameId, row: &Link, column: &Link) -> Result<Value> {
    let r = rt.eval_required(row, "cell.row", frame)?;
    let c = rt.eval_required(column, "cell.column", frame)?;
    rt.scopes.cell(frame, &r, &c)
}

// [rows] -> 0..rowCount
pub fn rows(rt: &Runtime, frame: FrameId) -> Value {
    ordinals(rt.scopes.data(frame).len())
}

// [columns] -> 0..columnCount, ordinals rather than names
pub fn columns(rt: &Runtime, frame: FrameId) -> Value {
    ordinals(rt.scopes.column_names(frame).len())
}

fn ordinals(n: usize) -> Value {
    Value::List((0..n).map(|i| Value::Num(i as f64)).collect())
}

pub fn column_name(rt: &mut Runtime, frame: FrameId, index: &Link) -> Result<Value> {
    let idx = rt.eval_required(index, "columnName.index", frame)?;
    let names = rt.scopes.column_names(frame);
    idx.as_index()
        .and_then(|i| names.get(i))
        .map(|name| Value::Str(name.clone()))
        .ok_or_else(|| {
            ChartError::IndexOutOfRange {
                what: "column",
                index: idx.to_string(),
                len: names.len(),
            }
            .into()
        })
}

/// Aggregate one column over every row of the dataset.
pub fn stat(rt: &mut Runtime, frame: FrameId, column: &Link, operator: &str) -> Result<Value> {
    let col = rt.eval_required(column, "stat.column", frame)?;
    if !STAT_OPERATORS.contains(&operator) {
        debug!(operator, "unknown stat operator");
        return Ok(Value::Unit);
    }
    let idx = rt.scopes.column_index(frame, &col)?;
    let mut values = Vec::new();
    for (r, row) in rt.scopes.data(frame).iter().enumerate() {
        let cell = row.get(idx).ok_or_else(|| ChartError::IndexOutOfRange {
            what: "column",
            index: format!("{idx} (row {r})"),
            len: row.len(),
        })?;
        values.push(cell.to_num());
    }
    apply_stat(operator, &values)
        .map(Value::Num)
        .ok_or_else(|| ChartError::EmptyAggregate(operator.to_string()).into())
}
