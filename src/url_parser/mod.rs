//! URL classification: normalization, lenient parsing and host splitting.

pub mod domain_info;
pub mod parser;
pub mod url_reconstructor;
pub mod url_validator;


pub use domain_info::{CompoundTlds, DomainInfo};
pub use parser::{classify, classify_with, is_valid, ClassifiedUrl, ClassifyError, UrlComponents};
pub use url_reconstructor::{strip_parameters, trim_last_segment};
