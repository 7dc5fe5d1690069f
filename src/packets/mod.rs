pub mod data;
pub mod flow;
pub mod layout;
pub mod math;
pub mod shape;
pub mod style;
pub mod transform;
pub mod value;
