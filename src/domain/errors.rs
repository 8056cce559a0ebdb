//! Engine errors for tag processing.

use std::fmt;

use thiserror::Error;

/// Boxed error produced by a handler body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The variant of handler that failed, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Replaces each matched element with produced markup.
    ElementReplacer,
    /// Mutates the whole tree for each matched element.
    TreeMutator,
    /// Runs once per pass against the whole tree.
    PageTransform,
    /// Completion-callback style function.
    Callback,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ElementReplacer => "ElementReplacer",
            Self::TreeMutator => "TreeMutator",
            Self::PageTransform => "PageTransform",
            Self::Callback => "Callback",
        };
        f.write_str(label)
    }
}

fn format_position(position: &Option<(usize, usize)>) -> String {
    position
        .map(|(index, total)| format!(" on element {} of {}", index + 1, total))
        .unwrap_or_default()
}

/// Errors raised while composing handler groups or processing a document.
///
/// Handler and group failures nest: each enclosing group wraps the failure of
/// its member, so `source()` walks from the outermost group down to the error
/// the handler body returned. Use [`EngineError::chain_message`] to render the
/// whole chain on one line.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind}({name}) failed{}", format_position(.position))]
    Handler {
        kind: HandlerKind,
        name: String,
        /// Zero-based index of the failing element and the size of the match set.
        position: Option<(usize, usize)>,
        #[source]
        source: BoxError,
    },

    #[error("{group} caught error in {member}")]
    Group {
        group: String,
        member: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Improper addition to group {group}: {reason}")]
    InvalidMember { group: String, reason: String },

    #[error("Unsupported selector: {0}")]
    InvalidSelector(String),

    #[error("Callback {0} dropped its completion handle without signalling")]
    CallbackAbandoned(String),

    #[error("Failed to parse markup")]
    Parse(#[source] std::io::Error),

    #[error("Failed to serialize document")]
    Serialize(#[source] std::io::Error),

    #[error("Processing did not converge after {0} passes")]
    PassLimitExceeded(usize),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while locating or rendering a partial template.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No partial found for {file_name} in {dirs:?}")]
    NotFound { file_name: String, dirs: Vec<String> },

    #[error("No rendering support for {0}")]
    Unsupported(String),

    #[error("Failed to read partial {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{engine} rendering of {file_name} failed because of {reason}")]
    Template {
        engine: String,
        file_name: String,
        reason: String,
    },
}

impl EngineError {
    /// Wrap a handler body failure with the handler's identity.
    pub fn handler(
        kind: HandlerKind,
        name: impl Into<String>,
        position: Option<(usize, usize)>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Handler {
            kind,
            name: name.into(),
            position,
            source: source.into(),
        }
    }

    /// Wrap a member failure with the enclosing group's name.
    pub fn in_group(self, group: impl Into<String>, member: impl Into<String>) -> Self {
        Self::Group {
            group: group.into(),
            member: member.into(),
            source: Box::new(self),
        }
    }

    /// Render this error and every chained cause as `outer: inner: root`.
    pub fn chain_message(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            parts.push(err.to_string());
            cause = err.source();
        }
        parts.join(": ")
    }

    /// The innermost error in the chain, usually the handler's own message.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut current: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Names of the handlers and groups the failure unwound through, outermost first.
    pub fn trail(&self) -> Vec<String> {
        let mut trail = Vec::new();
        let mut current = self;
        loop {
            match current {
                Self::Group { group, source, .. } => {
                    trail.push(group.clone());
                    current = source;
                }
                Self::Handler { kind, name, .. } => {
                    trail.push(format!("{kind}({name})"));
                    break;
                }
                _ => break,
            }
        }
        trail
    }
}
