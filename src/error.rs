//! Top-level error hierarchy for the engine.
//!
//! Every fallible entry point returns [`Result`]. Errors are split into the
//! four kinds fixed by the engine's error handling design: a parse error
//! passed through from an external front-end, a validation error raised
//! while building or planning a query, an unsupported-feature error, and a
//! runtime error reserved for broken internal invariants.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type returned by the query engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query text could not be parsed. The engine itself does not parse
    /// text; this variant exists so an embedder's front-end can surface its
    /// own parse failures through the same error type.
    #[error("parse error: {0}")]
    Parse(String),
    /// A semantic violation was found while building or planning the query.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A requested feature is not implemented by this engine or this host
    /// graph adapter.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    /// An internal invariant was broken. This should never happen for a
    /// well-formed query against a valid host graph; its presence indicates
    /// a bug in the engine.
    #[error("internal engine error: {0}")]
    Runtime(String),
}

impl EngineError {
    /// Machine-readable error code, primarily useful for tests and for
    /// embedders that want to branch on error kind without string matching.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Parse(_) => "ParseError",
            EngineError::Validation(v) => v.code(),
            EngineError::UnsupportedFeature(_) => "UnsupportedFeature",
            EngineError::Runtime(_) => "RuntimeError",
        }
    }
}

/// Semantic violations detected while building the motif, expanding hops,
/// planning the indexer pre-filter, or shaping results.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// No MATCH clause was supplied.
    #[error("query requires at least one MATCH clause")]
    EmptyMatches,
    /// A match variable was declared more than once with conflicting labels.
    #[error("duplicate match variable '{var}' with conflicting constraints")]
    DuplicateVariable {
        /// Offending variable name.
        var: String,
    },
    /// RETURN, WHERE, or ORDER BY referenced a variable that is not declared
    /// in any MATCH clause and is not the bound name of an edge.
    #[error("unknown variable '{var}' referenced in {context}")]
    UnknownVariable {
        /// Offending variable name.
        var: String,
        /// Clause the variable was referenced from.
        context: &'static str,
    },
    /// A hop range had `min_hop` greater than `max_hop`, or `max_hop` was
    /// zero.
    #[error("edge hop range [{min},{max}] is empty or inverted")]
    InvalidHopRange {
        /// Requested minimum hop count.
        min: u32,
        /// Requested maximum hop count.
        max: u32,
    },
    /// `max_hop` exceeded the hard cap of 100 (or a lower configured cap).
    #[error("max_hop {max} exceeds the allowed cap of {cap}")]
    HopCapExceeded {
        /// Requested maximum hop count.
        max: u32,
        /// Configured cap.
        cap: u32,
    },
    /// A bidirectional edge carried an explicit hop range.
    #[error("bidirectional edge on variable may not carry a hop range")]
    BidirectionalWithHopRange,
    /// The predicate tree exceeded the configured node budget.
    #[error("predicate tree exceeds {max} nodes (got {actual})")]
    PredicateTooLarge {
        /// Actual node count.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The predicate tree exceeded the configured nesting depth budget.
    #[error("predicate tree exceeds depth {max} (got {actual})")]
    PredicateTooDeep {
        /// Actual nesting depth.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
    /// An `IN` list literal was empty after normalization.
    #[error("IN requires at least one literal")]
    InListEmpty,
    /// A `BETWEEN`-style range had its lower bound above its upper bound.
    #[error("range lower bound must be <= upper bound")]
    InvalidRangeBounds,
    /// A float literal was NaN or infinite.
    #[error("float literal must be finite")]
    NonFiniteFloat,
    /// ORDER BY referenced a column that is not returned, not an aggregation
    /// alias, and DISTINCT is also requested — ambiguous under the
    /// strictest reading of the language, see design notes.
    #[error("ORDER BY references non-returned column '{column}' while DISTINCT is present")]
    OrderByNonReturnedWithDistinct {
        /// Offending column/alias name.
        column: String,
    },
    /// A projection alias was empty or whitespace-only.
    #[error("projection alias cannot be empty")]
    EmptyProjectionAlias,
}

impl ValidationError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyMatches => "EmptyMatches",
            ValidationError::DuplicateVariable { .. } => "DuplicateVariable",
            ValidationError::UnknownVariable { .. } => "UnknownVariable",
            ValidationError::InvalidHopRange { .. } => "InvalidHopRange",
            ValidationError::HopCapExceeded { .. } => "HopCapExceeded",
            ValidationError::BidirectionalWithHopRange => "BidirectionalWithHopRange",
            ValidationError::PredicateTooLarge { .. } => "PredicateTooLarge",
            ValidationError::PredicateTooDeep { .. } => "PredicateTooDeep",
            ValidationError::InListEmpty => "InListEmpty",
            ValidationError::InvalidRangeBounds => "InvalidRangeBounds",
            ValidationError::NonFiniteFloat => "NonFiniteFloat",
            ValidationError::OrderByNonReturnedWithDistinct { .. } => {
                "OrderByNonReturnedWithDistinct"
            }
            ValidationError::EmptyProjectionAlias => "EmptyProjectionAlias",
        }
    }
}
