pub type EngineResult<T> = Result<T, EngineError>;

/// Closed error taxonomy for the edit engine.
///
/// Every surfaced error leaves the session in its last committed state; no
/// partial command is ever pushed to history. `NothingToUndo` and
/// `NothingToRedo` are expected, recoverable conditions rather than faults.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid dimensions: {width}\u{d7}{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("coordinate ({x}, {y}) outside {width}\u{d7}{height} buffer")]
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("palette is full ({max} entries)")]
    PaletteOverflow { max: usize },

    #[error("palette index {index} is still referenced by the buffer")]
    IndexInUse { index: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transform target {width}\u{d7}{height} at ({x}, {y}) does not fit the buffer")]
    TransformOutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

impl EngineError {
    pub fn out_of_bounds(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self::OutOfBounds { x, y, width, height }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert!(
            EngineError::InvalidDimensions { width: 0, height: 4 }
                .to_string()
                .contains("invalid dimensions")
        );
        assert!(
            EngineError::out_of_bounds(-1, 3, 8, 8)
                .to_string()
                .contains("(-1, 3)")
        );
        assert_eq!(EngineError::NothingToUndo.to_string(), "nothing to undo");
        assert_eq!(EngineError::NothingToRedo.to_string(), "nothing to redo");
    }
}
