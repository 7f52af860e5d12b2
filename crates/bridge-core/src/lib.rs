#![deny(missing_docs)]
#![doc = "Core error, value and versioning types shared by the capability bridge crates."]

pub mod errors;
pub mod value;
pub mod version;

pub use errors::{BridgeError, ErrorInfo, MethodError};
pub use value::{validate_arguments, ArgShape, ArgSpec, Arguments, Constants, Value};
pub use version::{BridgeVersion, GenerationTag};
