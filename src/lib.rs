pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod field;
pub mod gpu;
pub mod lensing;
pub mod media;
pub mod observer;
pub mod render;
pub mod resize;
pub mod starfield;
pub mod warp;
pub mod tasks {
    pub mod catalog;
    pub mod loader;
    pub mod viewer;
}
