mod section;
mod section_id;
mod section_kind;
mod section_type;

pub use section::Section;
pub use section_id::{SectionId, SectionIdError, TEMP_PREFIX};
pub use section_kind::{
    Body, ExerciseQuestion, MediaSource, SectionKind, TextFormat, ValidationError,
};
pub use section_type::SectionType;
