use anyhow::{Result, anyhow};

use crate::compiler::{self, BlockView};
use crate::kernel::ast::{Link, Op, Opacity, Paint};
use crate::kernel::runtime::Runtime;
use crate::kernel::scope::FrameId;
use crate::kernel::values::{Value, format_num};

/// Named colours the colour picker offers besides raw hex values.
pub const THEME_COLORS: &[(&str, &str)] = &[
    ("blue", "#003764"),
    ("light blue", "#BBE0E3"),
    ("green", "#98CB00"),
    ("purple", "#800080"),
    ("red", "#EC0000"),
    ("yellow", "#FCC000"),
];

pub fn theme_color(name: &str) -> Option<&'static str> {
    THEME_COLORS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(_, hex)| *hex)
}

pub fn compile_color<B: BlockView>(b: &B) -> Result<Op> {
    let raw = compiler::field(b, "attribute")?;
    let attribute =
        Paint::from_name(&raw).ok_or_else(|| anyhow!("color: unsupported attribute '{raw}'"))?;
    let color = compiler::field(b, "color")?;
    let color = theme_color(&color).map(str::to_string).unwrap_or(color);
    Ok(Op::Color {
        attribute,
        color,
        next: compiler::next(b)?,
    })
}

pub fn compile_alpha<B: BlockView>(b: &B) -> Result<Op> {
    let raw = compiler::field(b, "type")?;
    let kind = Opacity::from_name(&raw).ok_or_else(|| anyhow!("alpha: unsupported type '{raw}'"))?;
    Ok(Op::Alpha {
        kind,
        alpha: compiler::input(b, "alpha")?,
        next: compiler::next(b)?,
    })
}

pub fn color(rt: &mut Runtime, frame: FrameId, attribute: Paint, color: &str) -> Result<Value> {
    let target = rt.top(frame)?;
    rt.surface.set_style(target, attribute.name(), color);
    Ok(Value::Unit)
}

/// `alpha` is a percentage.
pub fn alpha(rt: &mut Runtime, frame: FrameId, kind: Opacity, alpha: &Link) -> Result<Value> {
    let pct = rt.eval_required(alpha, "alpha.alpha", frame)?.to_num();
    let target = rt.top(frame)?;
    rt.surface.set_style(target, kind.name(), &format_num(pct / 100.0));
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

    #[test]
    fn theme_colours_resolve_by_name() {
        assert_eq!(theme_color("Light Blue"), Some("#BBE0E3"));
        assert_eq!(theme_color("#123456"), None);
    }

    #[test]
    fn styles_land_on_the_current_context() -> Result<()> {
        let program = Node::from_json(&json!(["rect", {
            "width": ["string", "4"], "height": ["string", "4"],
            "child": ["color", {"attribute": "stroke", "color": "#000000",
                "next": ["alpha", {"type": "fill-opacity", "alpha": ["string", "25"]}]}]
        }]))?;
        let mut doc = SvgDocument::new(10.0, 10.0);
        {
            let mut rt = Runtime::new(&mut doc, Dataset::default(), Config::default());
            rt.run(program.as_ref())?;
        }
        let group = doc.find("g").expect("shape group");
        assert_eq!(doc.style(group, "stroke"), Some("#000000"));
        assert_eq!(doc.style(group, "fill-opacity"), Some("0.25"));
        Ok(())
    }

    #[test]
    fn disabled_style_is_skipped_but_next_runs() -> Result<()> {
        let program = Node::from_json(&json!(["color", {
            "attribute": "fill", "color": "#ff0000", "disabled": true,
            "next": ["alpha", {"type": "opacity", "alpha": ["string", "50"]}]
        }]))?;
        let mut doc = SvgDocument::new(10.0, 10.0);
        {
            let mut rt = Runtime::new(&mut doc, Dataset::default(), Config::default());
            rt.run(program.as_ref())?;
        }
        let root = doc.root_id();
        assert_eq!(doc.style(root, "fill"), None);
        assert_eq!(doc.style(root, "opacity"), Some("0.5"));
        Ok(())
    }
}
