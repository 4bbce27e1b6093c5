mod entry;
mod entry_meta;
mod ids;
mod reflection;

pub use entry::{Entry, EntryBuilder};
pub use entry_meta::{EntryKind, EntryMeta, Tone, UnknownLabel};
pub use ids::{EntryId, ReflectionId};
pub use reflection::Reflection;
