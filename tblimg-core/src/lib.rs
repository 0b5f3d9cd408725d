pub mod binary;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod image;
pub mod payload;
pub mod sections;

pub use binary::*;
pub use convert::*;
pub use descriptor::*;
pub use error::{Result, TableError};
pub use format::{detect_format, ContainerFormat, ContainerRules};
pub use image::*;
pub use payload::*;
pub use sections::*;
