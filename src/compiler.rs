//! Turns an editor block graph into a serialized program.
//!
//! The editor is only read through [`BlockView`]. [`EditorBlock`] implements
//! it over the editor's JSON workspace format:
//!
//! ```json
//! {"type": "store", "fields": {"variable": "x"},
//!  "inputs": {"value": {"block": {"type": "string", "fields": {"data": "hi"}}}},
//!  "next": {"block": {}}, "enabled": false}
//! ```

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::kernel::ast::{Link, Node, Op};
use crate::kernel::error::ChartError;
use crate::kernel::stack;
use crate::packets::{data, flow, layout, math, shape, style, transform, value};

/// Read-only traversal of one editor block.
pub trait BlockView {
    fn kind(&self) -> &str;
    fn field(&self, name: &str) -> Option<String>;
    /// Block plugged into the named value or statement input.
    fn input(&self, name: &str) -> Option<&Self>;
    fn next_block(&self) -> Option<&Self>;
    fn is_disabled(&self) -> bool;
}

/// Compile `block` and everything reachable from it. An absent block is the
/// absent program.
pub fn compile<B: BlockView>(block: Option<&B>) -> Result<Option<Node>> {
    let Some(b) = block else {
        return Ok(None);
    };
    debug!(kind = b.kind(), "compile block");
    let op = match b.kind() {
        "string" => value::compile_string(b)?,
        "load" => value::compile_load(b)?,
        "store" => value::compile_store(b)?,
        "count" => value::compile_count(b)?,
        "cell" => data::compile_cell(b)?,
        "rows" => Op::Rows,
        "columns" => Op::Columns,
        "columnName" => data::compile_column_name(b)?,
        "stat" => data::compile_stat(b)?,
        "binary" => math::compile_binary(b)?,
        "width" => Op::Width,
        "height" => Op::Height,
        "align" => layout::compile_align(b)?,
        "margin" => layout::compile_margin(b)?,
        "color" => style::compile_color(b)?,
        "alpha" => style::compile_alpha(b)?,
        "forEach" => flow::for_each::compile(b)?,
        "conditional" => flow::conditionals::compile(b)?,
        "translate" => transform::compile_translate(b)?,
        "rotate" => transform::compile_rotate(b)?,
        "scale" => transform::compile_scale(b)?,
        "circle" => shape::compile_circle(b)?,
        "rect" => shape::compile_rect(b)?,
        "text" => shape::compile_text(b)?,
        other => return Err(ChartError::unknown_operation(other).into()),
    };
    Ok(Some(Node {
        op,
        disabled: b.is_disabled(),
    }))
}

/// Compiled expression or statement block plugged into input `name`.
pub fn input<B: BlockView>(b: &B, name: &str) -> Result<Link> {
    Ok(stack::ensure_sufficient_stack(|| compile(b.input(name)))?.map(Box::new))
}

/// Nested statement block of `b`. Older editors named that input `next`
/// on forEach, rotate and scale.
pub fn body<B: BlockView>(b: &B) -> Result<Link> {
    match b.input("child") {
        Some(_) => input(b, "child"),
        None => input(b, "next"),
    }
}

/// Compiled statement chained after `b`.
pub fn next<B: BlockView>(b: &B) -> Result<Link> {
    Ok(stack::ensure_sufficient_stack(|| compile(b.next_block()))?.map(Box::new))
}

pub fn field<B: BlockView>(b: &B, name: &str) -> Result<String> {
    b.field(name)
        .ok_or_else(|| anyhow!("{} block has no field '{name}'", b.kind()))
}

// ---- editor JSON ----

#[derive(Debug, Clone, Deserialize)]
pub struct EditorBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub inputs: HashMap<String, Connection>,
    #[serde(default)]
    pub next: Option<Connection>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub block: Option<Box<EditorBlock>>,
}

fn enabled_by_default() -> bool {
    true
}

impl BlockView for EditorBlock {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn input(&self, name: &str) -> Option<&Self> {
        self.inputs.get(name)?.block.as_deref()
    }

    fn next_block(&self) -> Option<&Self> {
        self.next.as_ref()?.block.as_deref()
    }

    fn is_disabled(&self) -> bool {
        self.disabled || !self.enabled
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    pub blocks: WorkspaceBlocks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceBlocks {
    #[serde(default)]
    pub blocks: Vec<EditorBlock>,
}

impl Workspace {
    /// Accepts either a full workspace or a single top-level block.
    pub fn from_json(src: &str) -> Result<Workspace> {
        let raw = stack::parse_json(src)?;
        if raw.get("type").is_some() {
            let block: EditorBlock = stack::from_value(raw)?;
            return Ok(Workspace {
                blocks: WorkspaceBlocks { blocks: vec![block] },
            });
        }
        stack::from_value(raw)
    }

    /// The program is the first top-level stack.
    pub fn top_block(&self) -> Option<&EditorBlock> {
        self.blocks.blocks.first()
    }

    pub fn compile(&self) -> Result<Option<Node>> {
        let program = compile(self.top_block())?;
        if let Some(node) = &program
            && !node.is_statement()
        {
            warn!(op = node.opcode(), "top-level block is an expression, it draws nothing");
        }
        Ok(program)
    }
}
