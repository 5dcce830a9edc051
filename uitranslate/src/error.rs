use thiserror::Error;

/// Errors raised while building a [`crate::KeyedTextCollection`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// Keys must be unique within one collection
    #[error("Duplicate key in collection: {0}")]
    DuplicateKey(String),
    /// A context was supplied for a key the collection does not hold
    #[error("Unknown key: {0}")]
    UnknownKey(String),
}

/// Errors raised by the resource codecs
#[derive(Debug, Error)]
pub enum CodecError {
    /// Source JSON could not be parsed or serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Source XML could not be parsed or written
    #[error("XML error: {0}")]
    Xml(String),
    /// A JSON resource whose root is not an object
    #[error("Invalid resource: root must be an object, found {0}")]
    NotAnObject(&'static str),
    /// A dot-path is used both as a leaf and as a container
    #[error("Key path conflict at '{0}': a value and a nested object share this path")]
    PathConflict(String),
    /// Two keys map to the same Android resource name
    #[error("Keys '{first}' and '{second}' both become resource name '{name}'")]
    ResourceNameCollision {
        name: String,
        first: String,
        second: String,
    },
    /// A `.strings` line that is neither a comment nor a `"key" = "value";` pair
    #[error("Malformed .strings line {line}: {content}")]
    StringsSyntax { line: usize, content: String },
}
