pub mod location;
pub mod path;
