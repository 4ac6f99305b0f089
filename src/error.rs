use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("table io failed for {table}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("table {table} is not valid csv")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("table {table} is corrupt: {message}")]
    Corrupt { table: String, message: String },

    #[error(transparent)]
    Import(#[from] ImportError),
}

impl StoreError {
    pub fn io(table: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            table: table.to_string(),
            source,
        }
    }

    pub fn csv(table: &str, source: csv::Error) -> Self {
        StoreError::Csv {
            table: table.to_string(),
            source,
        }
    }
}

/// Failures while bulk-loading students from an external CSV.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("cannot read import source: {0}")]
    Unreadable(String),

    #[error("import source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("import row {line}: {message}")]
    BadRow { line: u64, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
