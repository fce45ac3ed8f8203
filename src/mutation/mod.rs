pub mod add;
pub mod clipboard;
pub mod delete;
pub mod duplicate;
pub mod remove;

pub use add::{AddEntityOptions, PostCreate};
pub use clipboard::{ClipboardAsset, ClipboardPayload};

use crate::path::KeyPath;

pub(crate) fn children_path() -> KeyPath {
    KeyPath::parse("children")
}

pub(crate) fn parent_path() -> KeyPath {
    KeyPath::parse("parent")
}
