//! lapsecam - HTTP-controlled photo-timelapse recorder
//!
//! This crate provides the core functionality for lapsecam: periodic
//! still-image capture from a V4L2 camera and ffmpeg-based assembly of
//! the captured frames into timelapse videos.

pub mod camera;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod timelapse;
pub mod web;

pub use error::{AppError, Result};
