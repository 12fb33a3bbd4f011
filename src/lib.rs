pub mod annotation;
pub mod diff;
pub mod error;
pub mod extents;
pub mod model;
pub mod parser;
pub mod profile;
pub mod report;
pub mod resolver;
