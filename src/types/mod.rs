pub mod span;
pub mod syntax;
pub mod tree;
