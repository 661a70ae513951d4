use std::fmt;

use thiserror::Error;

use crate::validator::Violation;

/// Fatal failures. Any of these aborts the whole operation without output.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed input: {detail}")]
    MalformedInput { detail: String },
    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: f32 },
    #[error("{} name collision(s):\n{}", .0.len(), join_lines(.0))]
    NameCollision(Vec<Violation>),
    #[error("{kind} index {value} does not fit into {width} byte(s)")]
    IndexOverflow {
        kind: &'static str,
        value: i32,
        width: u8,
    },
    #[error("sidecar is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("sidecar could not be written: {0}")]
    XmlWrite(#[from] xmltree::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(detail: S) -> Self {
        Error::MalformedInput {
            detail: detail.into(),
        }
    }
}

fn join_lines(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal issues collected while an operation keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A texture referenced by the model is not on disk; its slot stays unbound.
    MissingResource { path: String },
    /// A shape key whose vertex count disagrees with its mesh; the key is skipped.
    ShapeMismatch {
        mesh: String,
        shape: String,
        expected: usize,
        found: usize,
    },
    MeshWithoutMaterial { mesh: String },
    /// A sidecar record names an entity that does not exist.
    UnresolvedName { kind: &'static str, name: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingResource { path } => write!(f, "texture not found: {}", path),
            Diagnostic::ShapeMismatch {
                mesh,
                shape,
                expected,
                found,
            } => write!(
                f,
                "shape key {} of {} has {} vertices, expected {}; skipped",
                shape, mesh, found, expected
            ),
            Diagnostic::MeshWithoutMaterial { mesh } => {
                write!(f, "mesh {} has no material; skipped", mesh)
            }
            Diagnostic::UnresolvedName { kind, name } => {
                write!(f, "{} {:?} not found; reference dropped", kind, name)
            }
        }
    }
}

/// Accumulated diagnostics, rendered as a multi-line report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.diagnostics {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}
