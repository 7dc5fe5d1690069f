use anyhow::Result;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::surface::Transform;
use crate::kernel::values::Value;

pub fn compile_translate<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Translate {
        x: compiler::input(b, "x")?,
        y: compiler::input(b, "y")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

// rotate and scale wrap a nested statement and have no successor of their own
pub fn compile_rotate<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Rotate {
        degrees: compiler::input(b, "degrees")?,
        child: compiler::body(b)?,
    })
}

pub fn compile_scale<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Scale {
        factor: compiler::input(b, "factor")?,
        child: compiler::body(b)?,
    })
}

pub fn translate(rt: &mut Runtime, frame: FrameId, x: &Link, y: &Link, child: &Link) -> Result<Value> {
    let tx = rt.eval_or_zero(x, frame)?;
    let ty = rt.eval_or_zero(y, frame)?;
    wrap(rt, frame, Transform::Translate(tx, ty), child, "translate.child")
}

pub fn rotate(rt: &mut Runtime, frame: FrameId, degrees: &Link, child: &Link) -> Result<Value> {
    let deg = rt.eval_required(degrees, "rotate.degrees", frame)?.to_num();
    wrap(rt, frame, Transform::Rotate(deg), child, "rotate.child")
}

pub fn scale(rt: &mut Runtime, frame: FrameId, factor: &Link, child: &Link) -> Result<Value> {
    let k = rt.eval_required(factor, "scale.factor", frame)?.to_num();
    wrap(rt, frame, Transform::Scale(k), child, "scale.child")
}

/// New group under the current context carrying `t`; `child` draws inside it.
fn wrap(
    rt: &mut Runtime,
    frame: FrameId,
    t: Transform,
    child: &Link,
    what: &'static str,
) -> Result<Value> {
    let parent = rt.top(frame)?;
    let group = rt.surface.append(parent, "g");
    rt.surface.set_attr(group, "transform", &t.to_string());
    rt.with_context(frame, group, |rt| rt.run_block(child, what, frame))?;
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::kernel::ast::Node;
    use crate::kernel::config::Config;
    use crate::kernel::error::ChartError;
    use crate::kernel::surface::Surface;
    use crate::svg::SvgDocument;
    use serde_json::json;

    fn run(src: serde_json::Value) -> Result<SvgDocument> {
        let program = Node::from_json(&src)?;
        let mut doc = SvgDocument::new(10.0, 10.0);
        {
            let mut rt = Runtime::new(&mut doc, Dataset::default(), Config::default());
            rt.run(program.as_ref())?;
        }
        Ok(doc)
    }

    #[test]
    fn translate_defaults_missing_offsets_to_zero() -> Result<()> {
        let doc = run(json!(["translate", {
            "y": ["string", "7"],
            "child": ["circle", {"radius": ["string", "2"]}]
        }]))?;
        let group = doc.find("g").expect("group");
        assert_eq!(doc.attr(group, "transform"), Some("translate(0, 7)"));
        assert_eq!(doc.find_all("circle").len(), 1);
        Ok(())
    }

    #[test]
    fn translate_requires_a_body() {
        let err = run(json!(["translate", {"x": ["string", "1"]}])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChartError>(),
            Some(&ChartError::MissingProgram("translate.child"))
        );
    }

    #[test]
    fn rotated_content_is_measured_rotated() -> Result<()> {
        let program = Node::from_json(&json!(["rotate", {
            "degrees": ["string", "90"],
            "child": ["rect", {"width": ["string", "10"], "height": ["string", "4"]}]
        }]))?;
        let mut doc = SvgDocument::new(0.0, 0.0);
        {
            let mut rt = Runtime::new(&mut doc, Dataset::default(), Config::default());
            rt.run(program.as_ref())?;
        }
        let group = doc.find("g").expect("group");
        assert_eq!(doc.attr(group, "transform"), Some("rotate(90)"));
        let outer = doc.bbox(doc.root_id());
        assert!((outer.width - 4.0).abs() < 1e-9);
        assert!((outer.height - 10.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn disabled_rotate_and_scale_still_draw() -> Result<()> {
        let doc = run(json!(["scale", {
            "disabled": true,
            "factor": ["string", "2"],
            "child": ["rotate", {"disabled": true, "degrees": ["string", "45"],
                "child": ["circle", {"radius": ["string", "1"]}]}]
        }]))?;
        assert_eq!(doc.find_all("circle").len(), 1);
        let group = doc.find("g").expect("group");
        assert_eq!(doc.attr(group, "transform"), Some("scale(2)"));
        Ok(())
    }

    #[test]
    fn context_stack_is_balanced_after_nesting() -> Result<()> {
        let program = Node::from_json(&json!(["translate", {
            "child": ["scale", {"factor": ["string", "2"],
                "child": ["translate", {"child": ["circle", {"radius": ["string", "1"]}]}]}],
            "next": ["color", {"attribute": "fill", "color": "#abcdef"}]
        }]))?;
        let mut doc = SvgDocument::new(10.0, 10.0);
        {
            let mut rt = Runtime::new(&mut doc, Dataset::default(), Config::default());
            rt.run(program.as_ref())?;
            let root = rt.root();
            assert_eq!(rt.top(root)?, rt.surface.root());
        }
        assert_eq!(doc.style(doc.root_id(), "fill"), Some("#abcdef"));
        Ok(())
    }

    #[test]
    fn rotate_and_scale_run_a_body_stored_under_next() -> Result<()> {
        let doc = run(json!(["scale", {
            "factor": ["string", "2"],
            "next": ["rotate", {"degrees": ["string", "90"],
                "next": ["circle", {"radius": ["string", "1"]}]}]
        }]))?;
        let groups = doc.find_all("g");
        assert_eq!(doc.attr(groups[0], "transform"), Some("scale(2)"));
        assert_eq!(doc.attr(groups[1], "transform"), Some("rotate(90)"));
        assert_eq!(doc.parent(groups[1]), Some(groups[0]));
        assert_eq!(doc.find_all("circle").len(), 1);
        Ok(())
    }
}
