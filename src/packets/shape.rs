use anyhow::Result;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::surface::ContextId;
use crate::kernel::values::Value;

pub fn compile_circle<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Circle {
        radius: compiler::input(b, "radius")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

pub fn compile_rect<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Rect {
        width: compiler::input(b, "width")?,
        height: compiler::input(b, "height")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

pub fn compile_text<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Text {
        text: compiler::input(b, "text")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

pub fn circle(rt: &mut Runtime, frame: FrameId, radius: &Link, child: &Link) -> Result<Value> {
    let r = rt.eval_required(radius, "circle.radius", frame)?;
    let group = shape_group(rt, frame)?;
    let prim = rt.surface.append(group, "circle");
    rt.surface.set_attr(prim, "r", &r.to_string());
    draw_inside(rt, frame, group, child)
}

pub fn rect(rt: &mut Runtime, frame: FrameId, width: &Link, height: &Link, child: &Link) -> Result<Value> {
    let w = rt.eval_required(width, "rect.width", frame)?;
    let h = rt.eval_required(height, "rect.height", frame)?;
    let group = shape_group(rt, frame)?;
    let prim = rt.surface.append(group, "rect");
    rt.surface.set_attr(prim, "width", &w.to_string());
    rt.surface.set_attr(prim, "height", &h.to_string());
    draw_inside(rt, frame, group, child)
}

pub fn text(rt: &mut Runtime, frame: FrameId, text: &Link, child: &Link) -> Result<Value> {
    let content = rt.eval_required(text, "text.text", frame)?;
    let group = shape_group(rt, frame)?;
    let prim = rt.surface.append(group, "text");
    rt.surface.set_style(prim, "text-anchor", "start");
    rt.surface.set_text(prim, &content.to_string());
    draw_inside(rt, frame, group, child)
}

// every shape lives in its own group under the current context
fn shape_group(rt: &mut Runtime, frame: FrameId) -> Result<ContextId> {
    let parent = rt.top(frame)?;
    Ok(rt.surface.append(parent, "g"))
}

/// Nested statements draw into the shape's group.
fn draw_inside(rt: &mut Runtime, frame: FrameId, group: ContextId, child: &Link) -> Result<Value> {
    if let Some(body) = child {
        rt.with_context(frame, group, |rt| rt.run_chain(Some(body), frame).map(|_| ()))?;
    }
    Ok(Value::Unit)
}
