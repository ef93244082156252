pub mod loaders;
pub mod question;
pub mod raw;

pub use loaders::{load_all_json_files, load_json_text, JsonSource};
pub use question::{Difficulty, OptionMap, Question, QuestionDraft, QuestionId};
pub use raw::{OptionEntries, RawField, RawItem, RawOptions, RawRecord};
