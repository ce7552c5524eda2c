mod category;
mod error;
mod model;
mod registry;

pub use category::Category;
pub use error::WorldError;
pub use model::World;
pub use registry::{load_world_file, WorldRegistry};
