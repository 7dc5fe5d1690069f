//! In-memory SVG tree used as the drawing surface.
//!
//! Elements live in a flat arena addressed by [`ContextId`]. Bounding boxes
//! are computed from circle, rect and text geometry, mapped through each
//! group's `transform` attribute on the way up.

use std::io::Write;

use anyhow::Result;
use tracing::warn;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::kernel::surface::{BBox, ContextId, Surface, Transform};

// text is measured with a fixed advance, there is no font engine here
const FONT_SIZE: f64 = 16.0;
const CHAR_ADVANCE: f64 = 0.6;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Default)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    style: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<ContextId>,
    children: Vec<ContextId>,
}

#[derive(Debug)]
pub struct SvgDocument {
    nodes: Vec<Element>,
}

impl SvgDocument {
    /// Empty `width` x `height` canvas. The root holds an invisible backdrop
    /// so the canvas reports its full size before anything is drawn.
    pub fn new(width: f64, height: f64) -> Self {
        let mut doc = Self {
            nodes: vec![Element {
                tag: "svg".into(),
                ..Element::default()
            }],
        };
        let root = doc.root_id();
        doc.set_attr(root, "width", &fmt_len(width));
        doc.set_attr(root, "height", &fmt_len(height));
        let backdrop = doc.append(root, "rect");
        doc.set_attr(backdrop, "width", &fmt_len(width));
        doc.set_attr(backdrop, "height", &fmt_len(height));
        doc.set_attr(backdrop, "fill", "transparent");
        doc.set_attr(backdrop, "stroke", "none");
        doc
    }

    pub fn root_id(&self) -> ContextId {
        ContextId(0)
    }

    pub fn tag(&self, id: ContextId) -> &str {
        self.get(id).map_or("", |e| e.tag.as_str())
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.get(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: ContextId) -> &[ContextId] {
        self.get(id).map_or(&[], |e| e.children.as_slice())
    }

    pub fn attr(&self, id: ContextId, name: &str) -> Option<&str> {
        self.get(id).and_then(|e| lookup(&e.attrs, name))
    }

    pub fn style(&self, id: ContextId, name: &str) -> Option<&str> {
        self.get(id).and_then(|e| lookup(&e.style, name))
    }

    pub fn text(&self, id: ContextId) -> Option<&str> {
        self.get(id).and_then(|e| e.text.as_deref())
    }

    /// First element named `tag` in document order, the root excluded.
    pub fn find(&self, tag: &str) -> Option<ContextId> {
        self.find_all(tag).into_iter().next()
    }

    /// Every element named `tag` in document order, the root excluded.
    pub fn find_all(&self, tag: &str) -> Vec<ContextId> {
        let mut out = Vec::new();
        let mut pending: Vec<ContextId> = self.children(self.root_id()).iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            if self.tag(id) == tag {
                out.push(id);
            }
            pending.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Serialize the tree as standalone SVG markup.
    pub fn to_svg(&self) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut writer = EmitterConfig::new()
                .perform_indent(true)
                .write_document_declaration(false)
                .create_writer(&mut out);
            self.write_element(&mut writer, self.root_id())?;
        }
        Ok(String::from_utf8(out)?)
    }

    fn write_element<W: Write>(&self, writer: &mut EventWriter<W>, id: ContextId) -> Result<()> {
        let Some(e) = self.get(id) else {
            return Ok(());
        };
        let css = e
            .style
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut start = XmlEvent::start_element(e.tag.as_str());
        if id == self.root_id() {
            start = start.default_ns(SVG_NS);
        }
        let mut start = e
            .attrs
            .iter()
            .fold(start, |b, (k, v)| b.attr(k.as_str(), v.as_str()));
        if !css.is_empty() {
            start = start.attr("style", css.as_str());
        }
        writer.write(start)?;
        if let Some(t) = &e.text {
            writer.write(XmlEvent::characters(t))?;
        }
        for child in &e.children {
            self.write_element(writer, *child)?;
        }
        writer.write(XmlEvent::end_element())?;
        Ok(())
    }

    fn get(&self, id: ContextId) -> Option<&Element> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: ContextId) -> Option<&mut Element> {
        let found = self.nodes.get_mut(id.0);
        if found.is_none() {
            warn!(node = id.0, "write to unknown svg node ignored");
        }
        found
    }

    fn num_attr(&self, id: ContextId, name: &str) -> f64 {
        self.attr(id, name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Own geometry of a primitive, in its own coordinates.
    fn geometry(&self, id: ContextId) -> Option<BBox> {
        match self.tag(id) {
            "circle" => {
                let r = self.num_attr(id, "r");
                let (cx, cy) = (self.num_attr(id, "cx"), self.num_attr(id, "cy"));
                Some(BBox::new(cx - r, cy - r, 2.0 * r, 2.0 * r))
            }
            "rect" => Some(BBox::new(
                self.num_attr(id, "x"),
                self.num_attr(id, "y"),
                self.num_attr(id, "width"),
                self.num_attr(id, "height"),
            )),
            "text" => {
                let chars = self.text(id).map_or(0, |t| t.chars().count());
                let x = self.num_attr(id, "x");
                let y = self.num_attr(id, "y");
                Some(BBox::new(
                    x,
                    y - 0.8 * FONT_SIZE,
                    chars as f64 * CHAR_ADVANCE * FONT_SIZE,
                    FONT_SIZE,
                ))
            }
            _ => None,
        }
    }

    /// Extent of `id`'s content in its own coordinates, ignoring its own
    /// transform. `None` when nothing below it has geometry.
    fn content_box(&self, id: ContextId) -> Option<BBox> {
        let mut acc = self.geometry(id);
        for child in self.children(id) {
            let Some(mut b) = self.content_box(*child) else {
                continue;
            };
            if let Some(t) = self.attr(*child, "transform") {
                match t.parse::<Transform>() {
                    Ok(t) => b = t.map_box(b),
                    Err(e) => warn!(node = child.0, error = %e, "transform ignored in bbox"),
                }
            }
            acc = Some(match acc {
                Some(a) => a.union(b),
                None => b,
            });
        }
        acc
    }
}

impl Surface for SvgDocument {
    fn root(&self) -> ContextId {
        self.root_id()
    }

    fn append(&mut self, parent: ContextId, tag: &str) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(Element {
            tag: tag.to_string(),
            parent: Some(parent),
            ..Element::default()
        });
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    fn set_attr(&mut self, node: ContextId, name: &str, value: &str) {
        if let Some(e) = self.get_mut(node) {
            upsert(&mut e.attrs, name, value);
        }
    }

    fn set_style(&mut self, node: ContextId, name: &str, value: &str) {
        if let Some(e) = self.get_mut(node) {
            upsert(&mut e.style, name, value);
        }
    }

    fn set_text(&mut self, node: ContextId, text: &str) {
        if let Some(e) = self.get_mut(node) {
            e.text = Some(text.to_string());
        }
    }

    fn bbox(&self, node: ContextId) -> BBox {
        self.content_box(node).unwrap_or_default()
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn upsert(pairs: &mut Vec<(String, String)>, name: &str, value: &str) {
    match pairs.iter_mut().find(|(k, _)| k == name) {
        Some(slot) => slot.1 = value.to_string(),
        None => pairs.push((name.to_string(), value.to_string())),
    }
}

fn fmt_len(n: f64) -> String {
    crate::kernel::values::format_num(n)
}
