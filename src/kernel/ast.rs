// src/kernel/ast.rs
use anyhow::Result;
use serde_json::{Map, Value as Json, json};

use crate::kernel::catalog;
use crate::kernel::stack;
use crate::kernel::error::ChartError;

pub type Link = Option<Box<Node>>;

/// One compiled puzzle piece: an opcode with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // expressions
    Str(String),
    Load(String),
    Width,
    Height,
    Count { value: Link },
    Cell { row: Link, column: Link },
    Rows,
    Columns,
    ColumnName { index: Link },
    Binary { x: Link, y: Link, operator: String },
    Stat { column: Link, operator: String },

    // statements
    Store { variable: String, value: Link, next: Link },
    Color { attribute: Paint, color: String, next: Link },
    Alpha { kind: Opacity, alpha: Link, next: Link },
    ForEach { set: Link, variable: String, child: Link, next: Link },
    Conditional { condition: Link, child: Link, next: Link },
    Translate { x: Link, y: Link, child: Link, next: Link },
    Rotate { degrees: Link, child: Link },
    Scale { factor: Link, child: Link },
    Align { horizontal: String, vertical: String, child: Link, next: Link },
    Margin { size: Link, child: Link, next: Link },
    Circle { radius: Link, child: Link, next: Link },
    Rect { width: Link, height: Link, child: Link, next: Link },
    Text { text: Link, child: Link, next: Link },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill,
    Stroke,
}

impl Paint {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "fill" => Some(Paint::Fill),
            "stroke" => Some(Paint::Stroke),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Paint::Fill => "fill",
            Paint::Stroke => "stroke",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opacity {
    Shape,
    Stroke,
    Fill,
}

impl Opacity {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "opacity" => Some(Opacity::Shape),
            "stroke-opacity" => Some(Opacity::Stroke),
            "fill-opacity" => Some(Opacity::Fill),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opacity::Shape => "opacity",
            Opacity::Stroke => "stroke-opacity",
            Opacity::Fill => "fill-opacity",
        }
    }
}

impl Node {
    pub fn opcode(&self) -> &'static str {
        match &self.op {
            Op::Str(_) => "string",
            Op::Load(_) => "load",
            Op::Width => "width",
            Op::Height => "height",
            Op::Count { .. } => "count",
            Op::Cell { .. } => "cell",
            Op::Rows => "rows",
            Op::Columns => "columns",
            Op::ColumnName { .. } => "columnName",
            Op::Binary { .. } => "binary",
            Op::Stat { .. } => "stat",
            Op::Store { .. } => "store",
            Op::Color { .. } => "color",
            Op::Alpha { .. } => "alpha",
            Op::ForEach { .. } => "forEach",
            Op::Conditional { .. } => "conditional",
            Op::Translate { .. } => "translate",
            Op::Rotate { .. } => "rotate",
            Op::Scale { .. } => "scale",
            Op::Align { .. } => "align",
            Op::Margin { .. } => "margin",
            Op::Circle { .. } => "circle",
            Op::Rect { .. } => "rect",
            Op::Text { .. } => "text",
        }
    }

    /// Sibling statement that runs after this one, if any.
    pub fn next(&self) -> Option<&Node> {
        match &self.op {
            Op::Store { next, .. }
            | Op::Color { next, .. }
            | Op::Alpha { next, .. }
            | Op::ForEach { next, .. }
            | Op::Conditional { next, .. }
            | Op::Translate { next, .. }
            | Op::Align { next, .. }
            | Op::Margin { next, .. }
            | Op::Circle { next, .. }
            | Op::Rect { next, .. }
            | Op::Text { next, .. } => next.as_deref(),
            _ => None,
        }
    }

    pub fn is_statement(&self) -> bool {
        !matches!(
            self.op,
            Op::Str(_)
                | Op::Load(_)
                | Op::Width
                | Op::Height
                | Op::Count { .. }
                | Op::Cell { .. }
                | Op::Rows
                | Op::Columns
                | Op::ColumnName { .. }
                | Op::Binary { .. }
                | Op::Stat { .. }
        )
    }

    // ---- serialized form: ["opcode", payload] ----

    pub fn to_json(&self) -> Json {
        let payload = match &self.op {
            Op::Str(s) | Op::Load(s) => return json!([self.opcode(), s]),
            Op::Width | Op::Height | Op::Rows | Op::Columns => Map::new(),
            Op::Count { value } => fields([("value", link(value))]),
            Op::Cell { row, column } => fields([("row", link(row)), ("column", link(column))]),
            Op::ColumnName { index } => fields([("index", link(index))]),
            Op::Binary { x, y, operator } => fields([
                ("x", link(x)),
                ("y", link(y)),
                ("operator", json!(operator)),
            ]),
            Op::Stat { column, operator } => {
                fields([("column", link(column)), ("operator", json!(operator))])
            }
            Op::Store { variable, value, next } => fields([
                ("variable", json!(variable)),
                ("value", link(value)),
                ("next", link(next)),
            ]),
            Op::Color { attribute, color, next } => fields([
                ("attribute", json!(attribute.name())),
                ("color", json!(color)),
                ("next", link(next)),
            ]),
            Op::Alpha { kind, alpha, next } => fields([
                ("type", json!(kind.name())),
                ("alpha", link(alpha)),
                ("next", link(next)),
            ]),
            Op::ForEach { set, variable, child, next } => fields([
                ("set", link(set)),
                ("variable", json!(variable)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Conditional { condition, child, next } => fields([
                ("condition", link(condition)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Translate { x, y, child, next } => fields([
                ("x", link(x)),
                ("y", link(y)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Rotate { degrees, child } => {
                fields([("degrees", link(degrees)), ("child", link(child))])
            }
            Op::Scale { factor, child } => {
                fields([("factor", link(factor)), ("child", link(child))])
            }
            Op::Align { horizontal, vertical, child, next } => fields([
                ("horizontal", json!(horizontal)),
                ("vertical", json!(vertical)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Margin { size, child, next } => fields([
                ("size", link(size)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Circle { radius, child, next } => fields([
                ("radius", link(radius)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Rect { width, height, child, next } => fields([
                ("width", link(width)),
                ("height", link(height)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
            Op::Text { text, child, next } => fields([
                ("text", link(text)),
                ("child", link(child)),
                ("next", link(next)),
            ]),
        };
        let mut payload = payload;
        if self.disabled {
            payload.insert("disabled".into(), Json::Bool(true));
        }
        json!([self.opcode(), payload])
    }

    /// Parse a program from its JSON text.
    pub fn parse(src: &str) -> Result<Option<Node>> {
        Node::from_json(&stack::parse_json(src)?)
    }

    /// Parse a serialized program. `null` is the absent program.
    pub fn from_json(v: &Json) -> Result<Option<Node>> {
        if v.is_null() {
            return Ok(None);
        }
        let (opcode, payload) = match v.as_array().map(Vec::as_slice) {
            Some([Json::String(op), payload]) => (op.as_str(), payload),
            _ => return Err(ChartError::malformed(format!("expected [opcode, payload], got {v}")).into()),
        };

        if !catalog::is_known_opcode(opcode) {
            return Err(ChartError::unknown_operation(opcode).into());
        }

        let (op, disabled) = match opcode {
            "string" => (Op::Str(bare_text(opcode, payload)?), false),
            "load" => (Op::Load(bare_text(opcode, payload)?), false),
            _ => {
                let p = Payload::new(opcode, payload)?;
                let op = match opcode {
                    "width" => Op::Width,
                    "height" => Op::Height,
                    "rows" => Op::Rows,
                    "columns" => Op::Columns,
                    "count" => Op::Count { value: p.link("value")? },
                    "cell" => Op::Cell { row: p.link("row")?, column: p.link("column")? },
                    "columnName" => Op::ColumnName { index: p.link("index")? },
                    "binary" => Op::Binary {
                        x: p.link("x")?,
                        y: p.link("y")?,
                        operator: p.text("operator")?,
                    },
                    "stat" => Op::Stat { column: p.link("column")?, operator: p.text("operator")? },
                    "store" => Op::Store {
                        variable: p.text("variable")?,
                        value: p.link("value")?,
                        next: p.link("next")?,
                    },
                    "color" => Op::Color {
                        attribute: p.choice("attribute", Paint::from_name)?,
                        color: p.text("color")?,
                        next: p.link("next")?,
                    },
                    "alpha" => Op::Alpha {
                        kind: p.choice("type", Opacity::from_name)?,
                        alpha: p.link("alpha")?,
                        next: p.link("next")?,
                    },
                    "forEach" => Op::ForEach {
                        set: p.link("set")?,
                        variable: p.text("variable")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "conditional" => Op::Conditional {
                        condition: p.link("condition")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "translate" => Op::Translate {
                        x: p.link("x")?,
                        y: p.link("y")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "rotate" => Op::Rotate { degrees: p.link("degrees")?, child: p.body()? },
                    "scale" => Op::Scale { factor: p.link("factor")?, child: p.body()? },
                    "align" => Op::Align {
                        horizontal: p.text("horizontal")?,
                        vertical: p.text("vertical")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "margin" => Op::Margin {
                        size: p.link("size")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "circle" => Op::Circle {
                        radius: p.link("radius")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "rect" => Op::Rect {
                        width: p.link("width")?,
                        height: p.link("height")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    "text" => Op::Text {
                        text: p.link("text")?,
                        child: p.link("child")?,
                        next: p.link("next")?,
                    },
                    other => return Err(ChartError::unknown_operation(other).into()),
                };
                (op, p.flag("disabled"))
            }
        };
        Ok(Some(Node { op, disabled }))
    }
}

fn link(l: &Link) -> Json {
    stack::ensure_sufficient_stack(|| l.as_ref().map(|n| n.to_json()).unwrap_or(Json::Null))
}

fn fields<const N: usize>(entries: [(&str, Json); N]) -> Map<String, Json> {
    entries
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn bare_text(opcode: &str, payload: &Json) -> Result<String> {
    match payload {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        _ => Err(ChartError::malformed(format!("{opcode} payload must be text, got {payload}")).into()),
    }
}

struct Payload<'a> {
    opcode: &'a str,
    map: &'a Map<String, Json>,
}

impl<'a> Payload<'a> {
    fn new(opcode: &'a str, v: &'a Json) -> Result<Self> {
        let map = v.as_object().ok_or_else(|| {
            ChartError::malformed(format!("{opcode} payload must be an object, got {v}"))
        })?;
        Ok(Self { opcode, map })
    }

    fn flag(&self, key: &str) -> bool {
        self.map.get(key).and_then(Json::as_bool).unwrap_or(false)
    }

    fn link(&self, key: &str) -> Result<Link> {
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => Ok(stack::ensure_sufficient_stack(|| Node::from_json(v))?.map(Box::new)),
        }
    }

    // rotate and scale programs may carry their body under `next`
    fn body(&self) -> Result<Link> {
        match self.map.get("child") {
            Some(_) => self.link("child"),
            None => self.link("next"),
        }
    }

    fn text(&self, key: &str) -> Result<String> {
        match self.map.get(key) {
            Some(Json::String(s)) => Ok(s.clone()),
            Some(Json::Number(n)) => Ok(n.to_string()),
            _ => Err(ChartError::malformed(format!("{}.{key} must be text", self.opcode)).into()),
        }
    }

    fn choice<T>(&self, key: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
        let raw = self.text(key)?;
        parse(&raw).ok_or_else(|| {
            ChartError::malformed(format!("{}.{key}: unsupported value '{raw}'", self.opcode)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_program() -> Result<()> {
        let src = json!(["store", {
            "variable": "v",
            "value": ["string", "hi"],
            "next": ["circle", {"radius": ["load", "v"], "disabled": true}]
        }]);
        let node = Node::from_json(&src)?.expect("program");
        assert_eq!(node.opcode(), "store");
        let next = node.next().expect("next");
        assert_eq!(next.opcode(), "circle");
        assert!(next.disabled);
        assert!(!node.disabled);
        assert_eq!(node.to_json(), src);
        Ok(())
    }

    #[test]
    fn null_is_the_absent_program() -> Result<()> {
        assert!(Node::from_json(&Json::Null)?.is_none());
        Ok(())
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let err = Node::from_json(&json!(["sparkle", {}])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChartError>(),
            Some(ChartError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        for bad in [
            json!("store"),
            json!(["store"]),
            json!(["store", "not an object"]),
            json!(["color", {"attribute": "glow", "color": "#fff"}]),
            json!(["load", {}]),
        ] {
            let err = Node::from_json(&bad).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ChartError>(), Some(ChartError::MalformedProgram(_))),
                "{bad} gave {err}"
            );
        }
    }

    #[test]
    fn statements_are_classified() {
        assert!(Node { op: Op::Rotate { degrees: None, child: None }, disabled: false }.is_statement());
        assert!(!Node { op: Op::Rows, disabled: false }.is_statement());
    }

    #[test]
    fn rotate_and_scale_accept_body_under_next() -> Result<()> {
        let circle = json!(["circle", {"radius": ["string", "2"]}]);
        let rotate = Node::from_json(&json!(["rotate", {"degrees": ["string", "90"], "next": circle}]))?
            .expect("rotate");
        let Op::Rotate { child: Some(body), .. } = &rotate.op else {
            panic!("rotate lost its body: {rotate:?}");
        };
        assert_eq!(body.opcode(), "circle");

        let scale = Node::from_json(&json!(["scale", {"factor": ["string", "2"], "next": circle}]))?
            .expect("scale");
        assert!(matches!(&scale.op, Op::Scale { child: Some(_), .. }));
        // written back under the canonical key
        assert_eq!(scale.to_json()[1]["child"], circle);
        Ok(())
    }

    #[test]
    fn long_chains_survive_text_round_trip() -> Result<()> {
        let mut text = r#"["store",{"variable":"n","value":["string","0"]}]"#.to_string();
        for i in 1..600 {
            text = format!(r#"["store",{{"variable":"n","value":["string","{i}"],"next":{text}}}]"#);
        }
        let node = Node::parse(&text)?.expect("program");
        let mut len = 0;
        let mut cur = Some(&node);
        while let Some(n) = cur {
            len += 1;
            cur = n.next();
        }
        assert_eq!(len, 600);
        Ok(())
    }
}
