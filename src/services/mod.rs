pub mod batch;
pub mod catalog;
pub mod evaluation;
pub mod recommendation;
pub mod serving;
