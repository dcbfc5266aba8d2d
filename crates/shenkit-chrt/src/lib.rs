//! Character placement scenes.
//!
//! A `CHRS` block is a flat list of named properties. `DEFIMAGE` and
//! `CHARACTER` open a new image definition or character; the properties
//! after it (`IMAGE`, `POSITION`, `ANGLE`, ...) describe that entry until
//! the next one starts.

mod error;
mod property;
mod scene;
mod string;

pub use error::{Error, Result};
pub use property::{
    ImageSource, Property, ANGLE_KIND_Y_ONLY, CHARACTER_MARKER, DEFIMAGE_MARKER, IMAGE_KIND_MODEL,
    IMAGE_KIND_REFERENCE,
};
pub use scene::{model_name, parse_chrt, read_chrt, CharacterScene, ChrtNode};
pub use string::read_string_field;
