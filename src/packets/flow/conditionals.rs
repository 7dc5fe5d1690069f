use anyhow::Result;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::Value;

pub fn compile<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Conditional {
        condition: compiler::input(b, "condition")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

// The condition is only evaluated when there is a body to run. The body
// shares the current frame.
pub fn handle(rt: &mut Runtime, frame: FrameId, condition: &Link, child: &Link) -> Result<Value> {
    if let Some(body) = child {
        let outcome = rt.eval_required(condition, "conditional.condition", frame)?;
        if outcome.truthy() {
            rt.run_chain(Some(body), frame)?;
        }
    }
    Ok(Value::Unit)
}
