/// Every opcode the compiler and the runtime understand, with the palette
/// category the editor files it under.
pub const OPCODES: &[(&str, Category)] = &[
    ("string", Category::Value),
    ("load", Category::Value),
    ("store", Category::Value),
    ("count", Category::Value),
    ("cell", Category::Value),
    ("rows", Category::Value),
    ("columns", Category::Value),
    ("columnName", Category::Value),
    ("binary", Category::Value),
    ("stat", Category::Value),
    ("width", Category::Layout),
    ("height", Category::Layout),
    ("align", Category::Layout),
    ("margin", Category::Layout),
    ("color", Category::Style),
    ("alpha", Category::Style),
    ("forEach", Category::Logic),
    ("conditional", Category::Logic),
    ("translate", Category::Transform),
    ("rotate", Category::Transform),
    ("scale", Category::Transform),
    ("circle", Category::Shape),
    ("rect", Category::Shape),
    ("text", Category::Shape),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Value,
    Layout,
    Style,
    Logic,
    Transform,
    Shape,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Value => "Value",
            Category::Layout => "Lay-out",
            Category::Style => "Style",
            Category::Logic => "Logic",
            Category::Transform => "Transform",
            Category::Shape => "Shape",
        }
    }
}

pub fn is_known_opcode(op: &str) -> bool {
    OPCODES.iter().any(|(name, _)| *name == op)
}

pub fn category_of(op: &str) -> Option<Category> {
    OPCODES
        .iter()
        .find(|(name, _)| *name == op)
        .map(|(_, cat)| *cat)
}

/// Opcodes grouped by category label, categories sorted by label.
pub fn palette() -> Vec<(&'static str, Vec<&'static str>)> {
    let mut groups: Vec<(&'static str, Vec<&'static str>)> = Vec::new();
    for (name, cat) in OPCODES {
        match groups.iter_mut().find(|(label, _)| *label == cat.label()) {
            Some((_, ops)) => ops.push(name),
            None => groups.push((cat.label(), vec![name])),
        }
    }
    groups.sort_by(|a, b| a.0.cmp(b.0));
    groups
}

/// Closest opcode within two edits of `op`, ignoring case.
pub fn suggest_opcode(op: &str) -> Option<&'static str> {
    OPCODES
        .iter()
        .map(|(name, _)| (*name, edit_distance(op, name)))
        .min_by_key(|(_, d)| *d)
        .filter(|(_, d)| *d <= 2)
        .map(|(name, _)| name)
}

/// Levenshtein distance over case-folded chars, one row at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_lowercase()).collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().map(|c| c.to_ascii_lowercase()).enumerate() {
        let mut diag = prev[0];
        prev[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = diag + usize::from(ca != *cb);
            diag = prev[j + 1];
            prev[j + 1] = substitute.min(prev[j] + 1).min(diag + 1);
        }
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_sorted_and_complete() {
        let groups = palette();
        let labels: Vec<_> = groups.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec!["Lay-out", "Logic", "Shape", "Style", "Transform", "Value"]
        );
        let total: usize = groups.iter().map(|(_, ops)| ops.len()).sum();
        assert_eq!(total, OPCODES.len());
    }

    #[test]
    fn suggests_case_insensitively() {
        assert_eq!(suggest_opcode("COLUMNNAME"), Some("columnName"));
        assert_eq!(suggest_opcode("forEch"), Some("forEach"));
        assert_eq!(suggest_opcode("zzzzzzzz"), None);
    }

    #[test]
    fn distance_counts_single_edits() {
        assert_eq!(edit_distance("rect", "rect"), 0);
        assert_eq!(edit_distance("Rect", "rect"), 0);
        assert_eq!(edit_distance("rec", "rect"), 1);
        assert_eq!(edit_distance("rext", "rect"), 1);
        assert_eq!(edit_distance("", "scale"), 5);
        assert_eq!(edit_distance("circel", "circle"), 2);
    }

    #[test]
    fn knows_every_category() {
        assert!(is_known_opcode("margin"));
        assert!(!is_known_opcode("Margin"));
        assert_eq!(category_of("stat"), Some(Category::Value));
        assert_eq!(category_of("rect"), Some(Category::Shape));
    }
}
