pub mod post;
pub mod tag;

pub use post::PostTags;
pub use tag::{InternalTag, TagOwnership, TagPatch};
