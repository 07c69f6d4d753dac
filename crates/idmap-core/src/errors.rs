use idmap_core_types::SessionId;
use thiserror::Error;

/// Result type alias using IdmapError
pub type Result<T> = std::result::Result<T, IdmapError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and CLI exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input/Validation
    InvalidInput,
    Validation,
    NotFound,

    // Tracking
    InvalidState,
    Concurrency,

    // Integration/IO
    Persistence,
    Serialization,
    Config,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional context: the operation that
/// failed, the entity type and key involved, and the session that issued it.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<i64>,
    session_id: Option<SessionId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_type: None,
            entity_id: None,
            session_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity type context
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Add entity key context
    pub fn with_entity_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Add session context
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.entity_id
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        match (&self.entity_type, self.entity_id) {
            (Some(entity_type), Some(id)) => write!(f, " ({} #{})", entity_type, id)?,
            (Some(entity_type), None) => write!(f, " ({})", entity_type)?,
            (None, Some(id)) => write!(f, " (#{})", id)?,
            (None, None) => {}
        }
        if let Some(source) = &self.source {
            write!(f, " <- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the model and tracking layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdmapError {
    /// A field required by the entity is absent from a row or value set
    #[error("{entity_type}: missing field '{field}'")]
    MissingField {
        entity_type: &'static str,
        field: String,
    },

    /// A field holds a value of the wrong kind
    #[error("{entity_type}: field '{field}' expected {expected}, found {found}")]
    FieldType {
        entity_type: &'static str,
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A filter references a column the entity does not have
    #[error("{entity_type}: unknown column '{column}'")]
    UnknownColumn {
        entity_type: &'static str,
        column: String,
    },

    /// A filter compares a column with a value of the wrong kind
    #[error("{entity_type}: column '{column}' holds {expected}, filter gave {found}")]
    FilterValueType {
        entity_type: &'static str,
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Entity failed validation before save
    #[error("{entity_type} failed validation: {reason}")]
    Validation {
        entity_type: &'static str,
        id: Option<i64>,
        reason: String,
    },

    /// The handle is not tracked by the session it was passed to
    #[error("{entity_type} #{id:?} is not tracked by this session")]
    NotTracked {
        entity_type: &'static str,
        id: Option<i64>,
    },

    /// The requested operation is not valid for the entity's tracking state
    #[error("{entity_type} #{id:?}: cannot {op} an entity in state {state}")]
    InvalidState {
        entity_type: &'static str,
        id: Option<i64>,
        op: &'static str,
        state: String,
    },

    /// The same key is already tracked by a different instance
    #[error("{entity_type} #{id} is already tracked by another instance")]
    DuplicateKey { entity_type: &'static str, id: i64 },
}

impl From<IdmapError> for ExError {
    fn from(err: IdmapError) -> Self {
        let message = err.to_string();
        match err {
            IdmapError::MissingField { entity_type, .. } => {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("materialize")
                    .with_entity_type(entity_type)
            }
            IdmapError::FieldType { entity_type, .. } => ExError::new(ExErrorKind::Serialization)
                .with_op("materialize")
                .with_entity_type(entity_type),
            IdmapError::UnknownColumn { entity_type, .. }
            | IdmapError::FilterValueType { entity_type, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("filter")
                    .with_entity_type(entity_type)
            }
            IdmapError::Validation {
                entity_type, id, ..
            } => with_optional_id(
                ExError::new(ExErrorKind::Validation)
                    .with_op("validate")
                    .with_entity_type(entity_type),
                id,
            ),
            IdmapError::NotTracked { entity_type, id } => with_optional_id(
                ExError::new(ExErrorKind::InvalidState).with_entity_type(entity_type),
                id,
            ),
            IdmapError::InvalidState {
                entity_type, id, op, ..
            } => with_optional_id(
                ExError::new(ExErrorKind::InvalidState)
                    .with_op(op)
                    .with_entity_type(entity_type),
                id,
            ),
            IdmapError::DuplicateKey { entity_type, id } => {
                ExError::new(ExErrorKind::InvalidState)
                    .with_op("track")
                    .with_entity_type(entity_type)
                    .with_entity_id(id)
            }
        }
        .with_message(message)
    }
}

fn with_optional_id(err: ExError, id: Option<i64>) -> ExError {
    match id {
        Some(id) => err.with_entity_id(id),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_op_and_entity() {
        let err = ExError::new(ExErrorKind::NotFound)
            .with_op("first")
            .with_entity_type("Customer")
            .with_entity_id(7)
            .with_message("sequence contains no elements");

        let text = err.to_string();
        assert!(text.starts_with("[ERR_NOT_FOUND]"));
        assert!(text.contains("'first'"));
        assert!(text.contains("Customer #7"));
        assert!(text.contains("no elements"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        let inner = ExError::new(ExErrorKind::Persistence).with_message("disk I/O error");
        let outer = ExError::new(ExErrorKind::Concurrency).with_source(inner);

        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Persistence)
        );
        assert!(std::error::Error::source(&outer).is_some());
        assert!(outer.to_string().contains("disk I/O error"));
    }
}
