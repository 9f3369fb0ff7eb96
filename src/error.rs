use std::path::PathBuf;
use thiserror::Error;

use crate::eval::EvalError;
use crate::idiom::Idiom;
use crate::rewrite::RewriteError;

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Why a module could not be rewritten. Any of these aborts the module.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The idiom's helper package is not resolvable from the module.
    #[error("cannot resolve '{helper}' from {}", .module.display())]
    HelperResolution {
        idiom: Idiom,
        helper: &'static str,
        module: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The argument of a matched call could not be evaluated.
    #[error("cannot evaluate {idiom} argument `{expression}` in {}", .module.display())]
    Evaluation {
        idiom: Idiom,
        module: PathBuf,
        expression: String,
        #[source]
        source: EvalError,
    },

    /// The idiom's resolver found no addon for the evaluated argument.
    #[error("{idiom} could not locate the native addon required by {}", .module.display())]
    Resolution {
        idiom: Idiom,
        module: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid input source map")]
    SourceMap(#[from] sourcemap::Error),

    #[error("cannot serialize the output source map")]
    MapOutput(#[source] sourcemap::Error),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

impl LoaderError {
    /// The idiom being processed when the error happened, if any.
    pub fn idiom(&self) -> Option<Idiom> {
        match self {
            LoaderError::HelperResolution { idiom, .. }
            | LoaderError::Evaluation { idiom, .. }
            | LoaderError::Resolution { idiom, .. } => Some(*idiom),
            LoaderError::SourceMap(_) | LoaderError::MapOutput(_) | LoaderError::Rewrite(_) => {
                None
            }
        }
    }
}
