//! Stack safety for deeply nested programs.
//!
//! A program is one long `next` chain nested inside itself, so both the JSON
//! it is stored as and the tree walkers over it recurse once per statement.
//! Parsing lifts serde_json's fixed nesting cap and grows the stack instead;
//! `run.max_depth` stays the only limit on how deep a program may go.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value as Json;

/// Grow the stack when less than this remains.
const RED_ZONE: usize = 64 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the stack if it is close to running out.
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Parse JSON text without a nesting limit.
pub fn parse_json(src: &str) -> Result<Json> {
    let mut de = serde_json::Deserializer::from_str(src);
    de.disable_recursion_limit();
    let value = Json::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Deserialize `T` out of an already parsed value, however deep.
pub fn from_value<T: for<'de> Deserialize<'de>>(value: Json) -> Result<T> {
    Ok(T::deserialize(serde_stacker::Deserializer::new(value))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_arrays(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn parses_past_the_default_nesting_cap() -> Result<()> {
        let v = parse_json(&nested_arrays(2000))?;
        assert!(v.is_array());
        Ok(())
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_json("[1] [2]").is_err());
        assert!(parse_json("[[1]").is_err());
    }
}
