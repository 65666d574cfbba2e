mod handler;
mod model;

pub use handler::update_location;
pub use model::{LocationInfo, UpdateLocationRequest};
