//! The machine façade and its collaborators.
//!
//! This module ties a processor and a memory into a [`Computer`] that
//! front ends can drive: program images, the tail-pointer I/O
//! convention, synchronous and stream execution, and the clocked
//! background driver.

pub mod clock;
pub mod computer;
pub mod image;

pub use computer::{Computer, ComputerError};
pub use image::{load_image, save_image, ImageError, ProgramImage, MAGIC_HEADER};
