use anyhow::Result;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::kernel::ast::{Link, Node, Op};
use crate::kernel::config::Config;
use crate::kernel::error::ChartError;
use crate::kernel::scope::{FrameId, Scopes};
use crate::kernel::stack;
use crate::kernel::surface::{ContextId, Surface};
use crate::kernel::values::Value;
use crate::packets::{data, flow, layout, math, shape, style, transform, value};

pub struct Runtime<'s> {
    pub scopes: Scopes,
    pub surface: &'s mut dyn Surface,
    pub cfg: Config,
    depth: usize,
}

impl<'s> Runtime<'s> {
    /// Root frame bound to `dataset`, with the surface's root container as
    /// the first drawing context.
    pub fn new(surface: &'s mut dyn Surface, dataset: Dataset, cfg: Config) -> Self {
        let mut scopes = Scopes::new(dataset.rows, dataset.columns);
        let root = scopes.root();
        scopes.push(root, surface.root());
        Self {
            scopes,
            surface,
            cfg,
            depth: 0,
        }
    }

    pub fn root(&self) -> FrameId {
        self.scopes.root()
    }

    /// Run a whole program against the root frame.
    pub fn run(&mut self, program: Option<&Node>) -> Result<Value> {
        let program = program.ok_or(ChartError::MissingProgram("program"))?;
        let root = self.root();
        self.run_chain(Some(program), root)
    }

    /// Execute `node` and every statement chained after it through `next`,
    /// returning the value of the last one.
    pub fn run_chain(&mut self, node: Option<&Node>, frame: FrameId) -> Result<Value> {
        let mut cur = node;
        let mut last = Value::Unit;
        while let Some(n) = cur {
            last = self.eval(n, frame)?;
            cur = n.next();
        }
        Ok(last)
    }

    /// Execute one node, without following `next`.
    pub fn eval(&mut self, node: &Node, frame: FrameId) -> Result<Value> {
        if self.depth >= self.cfg.max_depth {
            return Err(ChartError::RecursionLimit(self.cfg.max_depth).into());
        }
        self.depth += 1;
        let out = stack::ensure_sufficient_stack(|| self.dispatch(node, frame));
        self.depth -= 1;
        out
    }

    fn dispatch(&mut self, node: &Node, frame: FrameId) -> Result<Value> {
        debug!(op = node.opcode(), frame = ?frame, disabled = node.disabled, "execute");
        if node.disabled && honours_disabled(&node.op) {
            return Ok(Value::Unit);
        }
        match &node.op {
            Op::Str(s) => Ok(Value::Str(s.clone())),
            Op::Load(name) => self.scopes.get_variable(frame, name),
            Op::Width => layout::width(self, frame),
            Op::Height => layout::height(self, frame),
            Op::Count { value } => value::count(self, frame, value),
            Op::Cell { row, column } => data::cell(self, frame, row, column),
            Op::Rows => Ok(data::rows(self, frame)),
            Op::Columns => Ok(data::columns(self, frame)),
            Op::ColumnName { index } => data::column_name(self, frame, index),
            Op::Binary { x, y, operator } => math::binary(self, frame, x, y, operator),
            Op::Stat { column, operator } => data::stat(self, frame, column, operator),

            Op::Store { variable, value, .. } => value::store(self, frame, variable, value),
            Op::Color { attribute, color, .. } => style::color(self, frame, *attribute, color),
            Op::Alpha { kind, alpha, .. } => style::alpha(self, frame, *kind, alpha),
            Op::ForEach { set, variable, child, .. } => {
                flow::for_each::handle(self, frame, set, variable, child)
            }
            Op::Conditional { condition, child, .. } => {
                flow::conditionals::handle(self, frame, condition, child)
            }
            Op::Translate { x, y, child, .. } => transform::translate(self, frame, x, y, child),
            Op::Rotate { degrees, child } => transform::rotate(self, frame, degrees, child),
            Op::Scale { factor, child } => transform::scale(self, frame, factor, child),
            Op::Align { horizontal, vertical, child, .. } => {
                layout::align(self, frame, horizontal, vertical, child)
            }
            Op::Margin { size, child, .. } => layout::margin(self, frame, size, child),
            Op::Circle { radius, child, .. } => shape::circle(self, frame, radius, child),
            Op::Rect { width, height, child, .. } => {
                shape::rect(self, frame, width, height, child)
            }
            Op::Text { text, child, .. } => shape::text(self, frame, text, child),
        }
    }

    // ---- helpers for packets ----

    /// Evaluate an input that must be present.
    pub fn eval_required(&mut self, link: &Link, what: &'static str, frame: FrameId) -> Result<Value> {
        match link {
            Some(node) => self.eval(node, frame),
            None => Err(ChartError::MissingProgram(what).into()),
        }
    }

    /// Evaluate an optional numeric input, 0 when absent.
    pub fn eval_or_zero(&mut self, link: &Link, frame: FrameId) -> Result<f64> {
        match link {
            Some(node) => Ok(self.eval(node, frame)?.to_num()),
            None => Ok(0.0),
        }
    }

    /// Run a nested statement block that must be present.
    pub fn run_block(&mut self, link: &Link, what: &'static str, frame: FrameId) -> Result<()> {
        match link {
            Some(node) => self.run_chain(Some(node), frame).map(|_| ()),
            None => Err(ChartError::MissingProgram(what).into()),
        }
    }

    /// Push `ctx` in `frame`, run `body`, then pop from that same frame.
    pub fn with_context(
        &mut self,
        frame: FrameId,
        ctx: ContextId,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scopes.push(frame, ctx);
        body(self)?;
        let popped = self.scopes.pop(frame)?;
        if popped != ctx {
            warn!(pushed = ?ctx, popped = ?popped, "unbalanced drawing context stack");
        }
        debug_assert_eq!(popped, ctx, "nested block left the drawing context stack unbalanced");
        Ok(())
    }

    pub fn top(&self, frame: FrameId) -> Result<ContextId> {
        self.scopes.top(frame)
    }
}

// rotate and scale run their nested statement even when disabled
fn honours_disabled(op: &Op) -> bool {
    matches!(
        op,
        Op::Store { .. }
            | Op::Color { .. }
            | Op::Alpha { .. }
            | Op::ForEach { .. }
            | Op::Conditional { .. }
            | Op::Translate { .. }
            | Op::Align { .. }
            | Op::Margin { .. }
            | Op::Circle { .. }
            | Op::Rect { .. }
            | Op::Text { .. }
    )
}
