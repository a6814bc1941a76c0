//! Error types for the baking pipeline.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::Program;

/// Pipeline stage an error is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Edge-aware smoothing of the height field
    Bilateral,
    /// Ray marching and adjacency generation
    Occlusion,
    /// Multi-bounce propagation over the adjacency map
    Bounce,
    /// SH-lit validation render
    GroundTruth,
    /// Per-AO-bin averaging of a bake
    Histogram,
    /// Reading or writing an intermediate file
    Persist,
    /// Loading source height / normal maps
    Input,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Bilateral => "bilateral filtering",
            Stage::Occlusion => "occlusion sampling",
            Stage::Bounce => "indirect bounces",
            Stage::GroundTruth => "ground truth",
            Stage::Histogram => "histogram compilation",
            Stage::Persist => "persistence",
            Stage::Input => "input loading",
        };
        f.write_str(name)
    }
}

/// How the orchestrator must react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Abort the whole bake; nothing produced so far is trusted.
    Fatal,
    /// Report to the operator and skip the stage that failed.
    SkipStage,
}

/// Main error type for baking operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A persisted bake does not match the active height field
    #[error("Dimensions mismatch: expected {expected_w}x{expected_h}, found {found_w}x{found_h}")]
    DimensionMismatch {
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    /// A compute program could not be bound (failed to compile or is missing)
    #[error("Compute program {0} is unavailable")]
    ProgramUnavailable(Program),

    /// The compute backend rejected an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// A request exceeded a backend ceiling
    #[error("Resource limit exceeded: {what} ({requested} > {limit})")]
    ResourceLimit {
        what: &'static str,
        requested: usize,
        limit: usize,
    },

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File is truncated
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// File content is not what the format expects
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Invalid bake parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error attributed to a pipeline stage
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid format error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a dimension mismatch error from (w, h) pairs.
    pub fn dimension_mismatch(expected: (u32, u32), found: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            expected_w: expected.0,
            expected_h: expected.1,
            found_w: found.0,
            found_h: found.1,
        }
    }

    /// Attribute this error to a stage. Already attributed errors are kept as is.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ Error::Stage { .. } => e,
            e => Error::Stage { stage, source: Box::new(e) },
        }
    }

    /// Stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, with stage attribution stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            e => e,
        }
    }

    /// Classify the error: configuration, backend and resource errors abort the bake,
    /// missing or corrupt intermediate files only skip the failing stage.
    pub fn severity(&self) -> Severity {
        match self.root() {
            Error::FileNotFound(_)
            | Error::UnexpectedEof(_)
            | Error::InvalidFormat(_)
            | Error::Io(_)
            | Error::Json(_) => Severity::SkipStage,
            _ => Severity::Fatal,
        }
    }

    /// Shorthand for `severity() == Severity::Fatal`.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type alias for baking operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension to attribute errors of a `Result` to a stage.
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}
