pub mod local_image;

pub use local_image::{ImageError, LocalImage};
