pub mod collection_ext;
pub mod language;
pub mod scheduled_executor;
pub mod string_ext;

pub use collection_ext::{diff_sets, group_by, unique_ordered, vec_to_map, vec_to_map_with};
pub use scheduled_executor::{ScheduledExecutor, ScheduledTask};
pub use string_ext::{StringExt, clean_optional_string, trim_string};
