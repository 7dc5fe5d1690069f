use anyhow::Result;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::Value;

pub fn compile<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::ForEach {
        set: compiler::input(b, "set")?,
        variable: compiler::field(b, "variable")?,
        child: compiler::body(b)?,
        next: compiler::next(b)?,
    })
}

/// Runs `child` once per element, each time in a fresh frame holding only
/// the loop variable. Anything the body binds dies with its frame.
pub fn handle(
    rt: &mut Runtime,
    frame: FrameId,
    set: &Link,
    variable: &str,
    child: &Link,
) -> Result<Value> {
    let items = rt.eval_required(set, "forEach.set", frame)?.into_list();
    for item in items {
        let sub = rt.scopes.clone_frame(frame);
        rt.scopes.set_variable(sub, variable, item);
        let out = rt.run_block(child, "forEach.child", sub);
        rt.scopes.release(sub);
        out?;
    }
    Ok(Value::Unit)
}
