pub mod field;
pub mod mask;
pub mod overlay;
pub mod particles;
pub mod surface;
