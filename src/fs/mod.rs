pub mod dir;
pub mod fat;
pub mod image;
pub mod layout;
pub mod volume;

pub use dir::DirEntry;
pub use volume::{Fat32Volume, OpenMode, VolumeInfo};
