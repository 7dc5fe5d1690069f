//! Chained scope frames.
//!
//! Frames live in an arena and refer to their parent by [`FrameId`]. Child
//! frames are only ever created on top of the arena and released in reverse
//! order, so a frame can never outlive the statement that opened it.

use std::collections::HashMap;

use anyhow::Result;
use tracing::trace;

use crate::kernel::error::ChartError;
use crate::kernel::surface::ContextId;
use crate::kernel::values::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameId(usize);

#[derive(Debug, Default)]
struct Frame {
    data: Option<Vec<Vec<Value>>>,
    column_names: Option<Vec<String>>,
    variables: HashMap<String, Value>,
    stack: Vec<ContextId>,
    parent: Option<FrameId>,
}

#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    /// Arena holding only the root frame, bound to the dataset.
    pub fn new(rows: Vec<Vec<Value>>, column_names: Vec<String>) -> Self {
        let root = Frame {
            data: Some(rows),
            column_names: Some(column_names),
            ..Frame::default()
        };
        Self { frames: vec![root] }
    }

    pub fn root(&self) -> FrameId {
        FrameId(0)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a frame whose parent is `parent`, with nothing bound locally.
    pub fn clone_frame(&mut self, parent: FrameId) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(Frame {
            parent: Some(parent),
            ..Frame::default()
        });
        trace!(frame = id.0, parent = parent.0, "open frame");
        id
    }

    /// Drop `id` and every frame opened after it.
    pub fn release(&mut self, id: FrameId) {
        debug_assert!(id.0 > 0, "the root frame is never released");
        trace!(frame = id.0, "release frame");
        self.frames.truncate(id.0.max(1));
    }

    fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0]
    }

    fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0]
    }

    // ---- drawing contexts ----

    pub fn push(&mut self, id: FrameId, ctx: ContextId) {
        self.frame_mut(id).stack.push(ctx);
    }

    /// Innermost context, reading through to ancestors when the local stack is empty.
    pub fn top(&self, id: FrameId) -> Result<ContextId> {
        let mut cur = id;
        loop {
            let frame = self.frame(cur);
            if let Some(ctx) = frame.stack.last() {
                return Ok(*ctx);
            }
            match frame.parent {
                Some(p) => cur = p,
                None => return Err(ChartError::EmptyContextStack.into()),
            }
        }
    }

    /// Pops locally if possible, otherwise pops from the nearest ancestor
    /// that has something on its stack.
    pub fn pop(&mut self, id: FrameId) -> Result<ContextId> {
        let mut cur = id;
        loop {
            let frame = self.frame_mut(cur);
            if let Some(ctx) = frame.stack.pop() {
                if cur != id {
                    trace!(frame = id.0, owner = cur.0, "pop delegated to ancestor");
                }
                return Ok(ctx);
            }
            match frame.parent {
                Some(p) => cur = p,
                None => return Err(ChartError::EmptyContextStack.into()),
            }
        }
    }

    // ---- variables ----

    pub fn set_variable(&mut self, id: FrameId, name: &str, value: Value) {
        trace!(frame = id.0, name, "bind");
        self.frame_mut(id)
            .variables
            .insert(name.to_lowercase(), value);
    }

    pub fn get_variable(&self, id: FrameId, name: &str) -> Result<Value> {
        let key = name.to_lowercase();
        let mut cur = Some(id);
        while let Some(fid) = cur {
            let frame = self.frame(fid);
            if let Some(v) = frame.variables.get(&key) {
                return Ok(v.clone());
            }
            cur = frame.parent;
        }
        Err(ChartError::UndefinedVariable(name.to_string()).into())
    }

    // ---- dataset ----

    pub fn data(&self, id: FrameId) -> &[Vec<Value>] {
        let mut cur = Some(id);
        while let Some(fid) = cur {
            let frame = self.frame(fid);
            if let Some(rows) = &frame.data {
                return rows;
            }
            cur = frame.parent;
        }
        &[]
    }

    pub fn column_names(&self, id: FrameId) -> &[String] {
        let mut cur = Some(id);
        while let Some(fid) = cur {
            let frame = self.frame(fid);
            if let Some(names) = &frame.column_names {
                return names;
            }
            cur = frame.parent;
        }
        &[]
    }

    pub fn index_of_column_with_name(&self, id: FrameId, sought: &str) -> Option<usize> {
        let sought = sought.to_lowercase();
        self.column_names(id)
            .iter()
            .position(|name| name.to_lowercase() == sought)
    }

    /// Resolve a column reference: an ordinal, or failing that a column name.
    pub fn column_index(&self, id: FrameId, column: &Value) -> Result<usize> {
        if let Some(idx) = column.as_index() {
            return Ok(idx);
        }
        if let Value::Str(name) = column
            && let Some(idx) = self.index_of_column_with_name(id, name)
        {
            return Ok(idx);
        }
        Err(ChartError::IndexOutOfRange {
            what: "column",
            index: column.to_string(),
            len: self.column_names(id).len(),
        }
        .into())
    }

    pub fn cell(&self, id: FrameId, row: &Value, column: &Value) -> Result<Value> {
        let rows = self.data(id);
        let r = row
            .as_index()
            .and_then(|r| rows.get(r))
            .ok_or_else(|| ChartError::IndexOutOfRange {
                what: "row",
                index: row.to_string(),
                len: rows.len(),
            })?;
        let c = self.column_index(id, column)?;
        r.get(c).cloned().ok_or_else(|| {
            ChartError::IndexOutOfRange {
                what: "column",
                index: column.to_string(),
                len: r.len(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Scopes {
        Scopes::new(
            vec![
                vec![Value::Num(1.0), Value::from("a")],
                vec![Value::Num(2.0), Value::from("b")],
            ],
            vec!["Amount".into(), "Label".into()],
        )
    }

    fn err_of(r: Result<impl std::fmt::Debug>) -> ChartError {
        r.unwrap_err()
            .downcast::<ChartError>()
            .expect("chart error")
    }

    #[test]
    fn variables_are_case_insensitive_and_shadow() -> Result<()> {
        let mut s = scopes();
        let root = s.root();
        s.set_variable(root, "Item", Value::Num(1.0));
        let child = s.clone_frame(root);
        assert_eq!(s.get_variable(child, "ITEM")?, Value::Num(1.0));
        s.set_variable(child, "item", Value::Num(2.0));
        assert_eq!(s.get_variable(child, "item")?, Value::Num(2.0));
        assert_eq!(s.get_variable(root, "item")?, Value::Num(1.0));
        Ok(())
    }

    #[test]
    fn undefined_variable_at_any_depth() {
        let mut s = scopes();
        let root = s.root();
        let a = s.clone_frame(root);
        let b = s.clone_frame(a);
        assert_eq!(
            err_of(s.get_variable(b, "nope")),
            ChartError::UndefinedVariable("nope".into())
        );
        assert_eq!(
            err_of(s.get_variable(root, "nope")),
            ChartError::UndefinedVariable("nope".into())
        );
    }

    #[test]
    fn top_and_pop_delegate_to_parent() -> Result<()> {
        let mut s = scopes();
        let root = s.root();
        s.push(root, ContextId(7));
        let child = s.clone_frame(root);
        assert_eq!(s.top(child)?, ContextId(7));
        s.push(child, ContextId(8));
        assert_eq!(s.top(child)?, ContextId(8));
        assert_eq!(s.top(root)?, ContextId(7));
        assert_eq!(s.pop(child)?, ContextId(8));
        // the child has nothing left, so this reaches into the root's stack
        assert_eq!(s.pop(child)?, ContextId(7));
        assert_eq!(err_of(s.top(root)), ChartError::EmptyContextStack);
        Ok(())
    }

    #[test]
    fn release_drops_nested_frames() {
        let mut s = scopes();
        let root = s.root();
        let a = s.clone_frame(root);
        let _b = s.clone_frame(a);
        assert_eq!(s.depth(), 3);
        s.release(a);
        assert_eq!(s.depth(), 1);
    }

    #[test]
    fn dataset_reads_through_frames() -> Result<()> {
        let mut s = scopes();
        let child = s.clone_frame(s.root());
        assert_eq!(s.data(child).len(), 2);
        assert_eq!(s.cell(child, &Value::Num(1.0), &Value::Num(1.0))?, Value::from("b"));
        assert_eq!(s.cell(child, &Value::Num(0.0), &Value::from("amount"))?, Value::Num(1.0));
        assert_eq!(s.index_of_column_with_name(child, "LABEL"), Some(1));
        assert_eq!(s.index_of_column_with_name(child, "missing"), None);
        Ok(())
    }

    #[test]
    fn out_of_range_cells_fail() {
        let s = scopes();
        let root = s.root();
        assert!(matches!(
            err_of(s.cell(root, &Value::Num(5.0), &Value::Num(0.0))),
            ChartError::IndexOutOfRange { what: "row", len: 2, .. }
        ));
        assert!(matches!(
            err_of(s.cell(root, &Value::Num(0.0), &Value::Num(9.0))),
            ChartError::IndexOutOfRange { what: "column", .. }
        ));
    }
}
