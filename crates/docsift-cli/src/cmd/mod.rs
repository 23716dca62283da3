pub mod context;
pub mod corpus;
pub mod search;
