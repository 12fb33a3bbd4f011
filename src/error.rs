use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("can't find {file:?} under any source root")]
    Resolution { file: String },

    #[error("syntax error in {file}: {message}")]
    ParseSource { file: PathBuf, message: String },

    #[error("malformed cover profile at line {line}: {message}")]
    ProfileFormat { line: usize, message: String },

    #[error("malformed ignore annotation: {0}")]
    Annotation(String),

    #[error("unexpected node shape: {0}")]
    StructuralInvariant(String),

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<CovError>,
    },
}

impl CovError {
    /// Wrap an error with the processing stage it occurred in.
    pub fn stage(stage: &'static str, source: CovError) -> Self {
        CovError::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// The underlying error, with any stage wrappers peeled off.
    pub fn root(&self) -> &CovError {
        match self {
            CovError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, CovError>;
