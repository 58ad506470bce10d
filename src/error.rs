use thiserror::Error;

/// pgdao errors
#[derive(Error, Debug)]
pub enum PgdaoError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Failed to introspect schema '{schema}': {message}")]
    Introspection { schema: String, message: String },

    #[error("Template rendering failed for '{item}': {message}")]
    Render { item: String, message: String },

    #[error("Formatting generated code for '{item}' failed: {message}\n{fragment}")]
    Format {
        item: String,
        message: String,
        fragment: String,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
