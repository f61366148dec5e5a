pub mod chat;
pub mod image;

pub use chat::chat;
pub use image::image;
