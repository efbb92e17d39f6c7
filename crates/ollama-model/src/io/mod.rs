mod chunks;
mod lines;

pub use chunks::Chunks;
pub use lines::Lines;
