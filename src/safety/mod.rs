//! Query safety layer.
//!
//! Everything that decides whether caller-supplied SQL or identifiers may
//! reach the database, and how many rows they may return. All functions here
//! are pure and never touch a connection.

pub mod identifier;
pub mod lexer;
pub mod limit;
pub mod policy;
pub mod statement;

pub use identifier::{
    IdentifierKind, IdentifierOutcome, qualified_name, quote_identifier, validate_identifier,
    validate_identifiers,
};
pub use limit::{LimitDecision, LimitRewrite, enforce_limit, enforce_with_report};
pub use policy::SecurityPolicy;
pub use statement::{RejectionKind, ValidationOutcome, validate_statement};
