pub mod globe;
pub mod grid;
pub mod mesh;
pub mod solar;
