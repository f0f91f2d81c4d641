pub mod combine;
pub mod completion;
pub mod debug;
pub mod tree;
