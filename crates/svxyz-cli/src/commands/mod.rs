pub mod extract;
pub mod filter;
