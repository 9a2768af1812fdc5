//! Well-known tag class names.
//!
//! These must match the seed rows in the `tag_classes` migration. The set
//! is extensible through that table; unknown classes are rejected by the
//! database, not by this list.

pub const CLASS_ARTIST: &str = "artist";
pub const CLASS_SUBJECT: &str = "subject";
pub const CLASS_SPONSOR: &str = "sponsor";
pub const CLASS_SPECIES: &str = "species";
pub const CLASS_GENDER: &str = "gender";
pub const CLASS_MISC: &str = "misc";
