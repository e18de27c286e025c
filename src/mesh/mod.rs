pub mod edge;
pub mod model;
pub mod node;
pub mod verify;
