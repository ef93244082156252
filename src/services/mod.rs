pub mod exporter;
pub mod repository;
pub mod serializer;
pub mod snapshot;
pub mod validator;
pub mod warn_writer;

pub use exporter::{export_to_path, import_from_path, suggest_export_file_name, DEFAULT_EXPORT_FILE_NAME};
pub use repository::{
    FieldValue, LoadMode, QuestionRepository, QuestionUpdate, RepositoryEvent, RepositoryWarning,
};
pub use serializer::{from_text, to_text, ParseError, TextFormat};
pub use snapshot::{Snapshot, SnapshotRecord};
pub use validator::{
    has_blocking, validate_questions, validate_record, validate_record_set,
    Finding, KnownKeys, RecordRef, Severity,
};
pub use warn_writer::WarnWriter;
