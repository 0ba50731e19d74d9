mod collection;
mod pagination;
mod relation;
mod resolver;

pub use collection::*;
pub use pagination::*;
pub use relation::*;
pub use resolver::*;
