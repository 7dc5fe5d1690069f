use thiserror::Error;

/// Fatal interpreter failures. Every one of these aborts the render pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("unknown operation '{name}'{}", hint.map(|h| format!(" (did you mean '{h}'?)")).unwrap_or_default())]
    UnknownOperation {
        name: String,
        hint: Option<&'static str>,
    },

    #[error("variable '{0}' does not exist")]
    UndefinedVariable(String),

    #[error("missing puzzle piece: {0}")]
    MissingProgram(&'static str),

    #[error("index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: String,
        len: usize,
    },

    #[error("drawing context stack is empty")]
    EmptyContextStack,

    #[error("cannot compute '{0}' over an empty column")]
    EmptyAggregate(String),

    #[error("program nesting exceeded max depth of {0}")]
    RecursionLimit(usize),

    #[error("malformed program: {0}")]
    MalformedProgram(String),
}

impl ChartError {
    pub fn unknown_operation(name: &str) -> Self {
        ChartError::UnknownOperation {
            name: name.to_string(),
            hint: crate::kernel::catalog::suggest_opcode(name),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        ChartError::MalformedProgram(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_mentions_close_match() {
        let err = ChartError::unknown_operation("circel");
        assert_eq!(
            err.to_string(),
            "unknown operation 'circel' (did you mean 'circle'?)"
        );
    }

    #[test]
    fn unknown_operation_without_match_has_no_hint() {
        let err = ChartError::unknown_operation("teleport");
        assert_eq!(err.to_string(), "unknown operation 'teleport'");
    }
}
