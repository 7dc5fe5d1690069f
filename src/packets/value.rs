use anyhow::Result;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::Value;

// [string] -> constant text typed into the block
pub fn compile_string<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Str(compiler::field(b, "data")?))
}

// [load] -> value of a variable, looked up through enclosing frames
pub fn compile_load<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Load(compiler::field(b, "variable")?))
}

pub fn compile_store<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Store {
        variable: compiler::field(b, "variable")?,
        value: compiler::input(b, "value")?,
        next: compiler::next(b)?,
    })
}

pub fn compile_count<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Count {
        value: compiler::input(b, "value")?,
    })
}

/// Binds in `frame` only; enclosing frames keep their own binding.
pub fn store(rt: &mut Runtime, frame: FrameId, variable: &str, value: &Link) -> Result<Value> {
    let v = rt.eval_required(value, "store.value", frame)?;
    rt.scopes.set_variable(frame, variable, v);
    Ok(Value::Unit)
}

pub fn count(rt: &mut Runtime, frame: FrameId, value: &Link) -> Result<Value> {
    let v = rt.eval_required(value, "count.value", frame)?;
    Ok(Value::Num(v.length().unwrap_or(0) as f64))
}
