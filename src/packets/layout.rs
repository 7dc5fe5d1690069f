use anyhow::{Result, bail};
use tracing::debug;

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::surface::{BBox, Transform};
use crate::kernel::values::{Value, format_num};

pub const HORIZONTAL: &[&str] = &["left", "middle", "right"];
pub const VERTICAL: &[&str] = &["top", "middle", "bottom"];

pub fn compile_align<B: BlockView>(b: &B) -> Result<Op> {
    let horizontal = compiler::field(b, "horizontal")?;
    let vertical = compiler::field(b, "vertical")?;
    if !HORIZONTAL.contains(&horizontal.as_str()) || !VERTICAL.contains(&vertical.as_str()) {
        bail!("align: unsupported anchor '{horizontal}'/'{vertical}'");
    }
    Ok(Op::Align {
        horizontal,
        vertical,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

pub fn compile_margin<B: BlockView>(b: &B) -> Result<Op> {
    Ok(Op::Margin {
        size: compiler::input(b, "size")?,
        child: compiler::input(b, "child")?,
        next: compiler::next(b)?,
    })
}

pub fn width(rt: &mut Runtime, frame: FrameId) -> Result<Value> {
    let ctx = rt.top(frame)?;
    Ok(Value::Num(rt.surface.bbox(ctx).width))
}

pub fn height(rt: &mut Runtime, frame: FrameId) -> Result<Value> {
    let ctx = rt.top(frame)?;
    Ok(Value::Num(rt.surface.bbox(ctx).height))
}

/// Draw `child` into a fresh container, then shift the container so its
/// content sits at the requested edge or centre of the parent.
pub fn align(
    rt: &mut Runtime,
    frame: FrameId,
    horizontal: &str,
    vertical: &str,
    child: &Link,
) -> Result<Value> {
    let parent = rt.top(frame)?;
    let parent_box = rt.surface.bbox(parent);

    let container = rt.surface.append(parent, "g");
    rt.with_context(frame, container, |rt| {
        if let Some(body) = child {
            rt.run_chain(Some(body), frame)?;
        }
        Ok(())
    })?;

    let child_box = rt.surface.bbox(container);
    let (tx, ty) = align_offset(horizontal, vertical, parent_box, child_box);
    debug!(horizontal, vertical, tx, ty, "align");
    rt.surface
        .set_attr(container, "transform", &Transform::Translate(tx, ty).to_string());
    Ok(Value::Unit)
}

/// Offset that anchors `child` inside `parent`. Unknown anchors leave that
/// axis untouched.
pub fn align_offset(horizontal: &str, vertical: &str, parent: BBox, child: BBox) -> (f64, f64) {
    let tx = anchor(horizontal, ("left", "right"), parent.width, child.width, child.x);
    let ty = anchor(vertical, ("top", "bottom"), parent.height, child.height, child.y);
    (tx, ty)
}

fn anchor(choice: &str, (start, end): (&str, &str), outer: f64, inner: f64, offset: f64) -> f64 {
    if choice == start {
        -offset
    } else if choice == end {
        outer - inner - offset
    } else if choice == "middle" {
        (outer - inner) / 2.0 - offset
    } else {
        0.0
    }
}

/// Inset the current context by `size` on every side and reserve the inner
/// area with an invisible filler.
pub fn margin(rt: &mut Runtime, frame: FrameId, size: &Link, child: &Link) -> Result<Value> {
    let parent = rt.top(frame)?;
    let bbox = rt.surface.bbox(parent);
    let m = rt.eval_required(size, "margin.size", frame)?.to_num();

    let container = rt.surface.append(parent, "g");
    rt.surface
        .set_attr(container, "transform", &Transform::Translate(m, m).to_string());
    let filler = rt.surface.append(container, "rect");
    rt.surface.set_attr(filler, "fill", "transparent");
    rt.surface.set_attr(filler, "stroke", "none");
    rt.surface.set_attr(filler, "width", &format_num(bbox.width - 2.0 * m));
    rt.surface.set_attr(filler, "height", &format_num(bbox.height - 2.0 * m));

    rt.with_context(frame, container, |rt| {
        if let Some(body) = child {
            rt.run_chain(Some(body), frame)?;
        }
        Ok(())
    })?;
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::kernel::ast::Node;
    use crate::kernel::config::Config;
    use crate::svg::SvgDocument;
    use serde_json::json;

    fn run_in(doc: &mut SvgDocument, src: serde_json::Value) -> Result<Value> {
        let program = Node::from_json(&src)?;
        let mut rt = Runtime::new(doc, Dataset::default(), Config::default());
        rt.run(program.as_ref())
    }

    fn rect(w: f64, h: f64) -> serde_json::Value {
        json!(["rect", {"width": ["string", w.to_string()], "height": ["string", h.to_string()]}])
    }

    #[test]
    fn middle_middle_offsets() {
        let parent = BBox::new(0.0, 0.0, 100.0, 50.0);
        let child = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(align_offset("middle", "middle", parent, child), (45.0, 20.0));
        assert_eq!(align_offset("right", "bottom", parent, child), (90.0, 40.0));
        let shifted = BBox::new(3.0, -2.0, 10.0, 10.0);
        assert_eq!(align_offset("left", "top", parent, shifted), (-3.0, 2.0));
        assert_eq!(align_offset("centre", "nowhere", parent, shifted), (0.0, 0.0));
    }

    #[test]
    fn align_translates_container_inside_parent() -> Result<()> {
        // a 100x50 rectangle with a 10x10 one centred inside it
        let mut outer = rect(100.0, 50.0);
        outer[1]["child"] = json!(["align", {
            "horizontal": "middle", "vertical": "middle",
            "child": rect(10.0, 10.0)
        }]);
        let mut doc = SvgDocument::new(500.0, 500.0);
        run_in(&mut doc, outer)?;

        let aligned: Vec<_> = doc
            .find_all("g")
            .into_iter()
            .filter(|g| doc.attr(*g, "transform").is_some())
            .collect();
        assert_eq!(aligned.len(), 1);
        assert_eq!(doc.attr(aligned[0], "transform"), Some("translate(45, 20)"));
        Ok(())
    }

    #[test]
    fn width_and_height_read_the_current_context() -> Result<()> {
        let mut doc = SvgDocument::new(320.0, 240.0);
        assert_eq!(run_in(&mut doc, json!(["width", {}]))?, Value::Num(320.0));
        assert_eq!(run_in(&mut doc, json!(["height", {}]))?, Value::Num(240.0));
        Ok(())
    }

    #[test]
    fn margin_reserves_inset_area() -> Result<()> {
        let mut doc = SvgDocument::new(100.0, 60.0);
        run_in(
            &mut doc,
            json!(["margin", {
                "size": ["string", "10"],
                "child": ["store", {"variable": "w", "value": ["width", {}],
                    "next": ["text", {"text": ["load", "w"]}]}]
            }]),
        )?;
        let container = doc.find("g").expect("container");
        assert_eq!(doc.attr(container, "transform"), Some("translate(10, 10)"));
        let filler = doc.children(container)[0];
        assert_eq!(doc.attr(filler, "width"), Some("80"));
        assert_eq!(doc.attr(filler, "height"), Some("40"));
        assert_eq!(doc.attr(filler, "fill"), Some("transparent"));
        // the inner width is the filler's
        let label = doc.find("text").expect("label");
        assert_eq!(doc.text(label), Some("80"));
        Ok(())
    }

    #[test]
    fn disabled_margin_draws_nothing() -> Result<()> {
        let mut doc = SvgDocument::new(100.0, 60.0);
        run_in(
            &mut doc,
            json!(["margin", {"disabled": true, "size": ["string", "10"],
                "next": ["circle", {"radius": ["string", "3"]}]}]),
        )?;
        // only the circle's own group exists
        assert_eq!(doc.find_all("g").len(), 1);
        assert_eq!(doc.find_all("circle").len(), 1);
        Ok(())
    }
}
