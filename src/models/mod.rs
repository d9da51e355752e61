mod batch;
mod code;
mod company;
mod product;

pub use batch::*;
pub use code::*;
pub use company::*;
pub use product::*;
