//! Query understanding for listing searches
//!
//! - `parser`: split free text into keyword and location
//! - `location`: reduce a location to a title-cased city

mod location;
mod parser;

pub use location::{city_only, search_location, title_case};
pub use parser::{
    ParsedQuery, QueryFormat, QueryIssue, QueryParser, QueryParserConfig, QueryValidation,
};
