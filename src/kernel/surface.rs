use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};

use crate::kernel::values::format_num;

/// Opaque handle to a renderable container on a [`Surface`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn union(self, other: BBox) -> BBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        BBox::new(x0, y0, x1 - x0, y1 - y0)
    }

    fn corners(self) -> [(f64, f64); 4] {
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [(self.x, self.y), (x1, self.y), (x1, y1), (self.x, y1)]
    }

    fn from_points(points: &[(f64, f64)]) -> BBox {
        let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
        let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in points {
            x0 = x0.min(*x);
            y0 = y0.min(*y);
            x1 = x1.max(*x);
            y1 = y1.max(*y);
        }
        BBox::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// The single transform a container group carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    Translate(f64, f64),
    Rotate(f64),
    Scale(f64),
}

impl Transform {
    pub fn apply(self, (x, y): (f64, f64)) -> (f64, f64) {
        match self {
            Transform::Translate(tx, ty) => (x + tx, y + ty),
            Transform::Scale(s) => (x * s, y * s),
            Transform::Rotate(deg) => {
                let (sin, cos) = deg.to_radians().sin_cos();
                (x * cos - y * sin, x * sin + y * cos)
            }
        }
    }

    /// Box of `b` once this transform is applied to it.
    pub fn map_box(self, b: BBox) -> BBox {
        let pts = b.corners().map(|p| self.apply(p));
        BBox::from_points(&pts)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Translate(x, y) => {
                write!(f, "translate({}, {})", format_num(*x), format_num(*y))
            }
            Transform::Rotate(d) => write!(f, "rotate({})", format_num(*d)),
            Transform::Scale(s) => write!(f, "scale({})", format_num(*s)),
        }
    }
}

impl FromStr for Transform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let open = s.find('(').ok_or_else(|| anyhow!("transform needs '(': {s}"))?;
        if !s.ends_with(')') {
            bail!("transform needs ')': {s}");
        }
        let name = s[..open].trim();
        let args: Vec<f64> = s[open + 1..s.len() - 1]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        match (name, args.as_slice()) {
            ("translate", [x]) => Ok(Transform::Translate(*x, 0.0)),
            ("translate", [x, y]) => Ok(Transform::Translate(*x, *y)),
            ("rotate", [d]) => Ok(Transform::Rotate(*d)),
            ("scale", [k]) => Ok(Transform::Scale(*k)),
            _ => bail!("unsupported transform: {s}"),
        }
    }
}

/// The drawing substrate the statement opcodes render into.
pub trait Surface {
    /// Container the program draws into before anything is pushed.
    fn root(&self) -> ContextId;
    /// Create a child element named `tag` under `parent`.
    fn append(&mut self, parent: ContextId, tag: &str) -> ContextId;
    fn set_attr(&mut self, node: ContextId, name: &str, value: &str);
    fn set_style(&mut self, node: ContextId, name: &str, value: &str);
    fn set_text(&mut self, node: ContextId, text: &str);
    /// Extent of `node`'s rendered content in its own coordinate space.
    fn bbox(&self, node: ContextId) -> BBox;
}
