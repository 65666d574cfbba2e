mod handler;
mod model;

pub use handler::{
    create_path,
    get_my_path,
    delete_my_path,
    find_nearby_users,
    find_crossing_paths
};
pub use model::{
    CreatePathRequest, CrossingQuery, NearbyUserInfo, NearbyUsersQuery, NearbyUsersResponse,
    PathInfo,
};
