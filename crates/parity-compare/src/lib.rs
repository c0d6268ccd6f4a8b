//! Differential comparison engine
//!
//! Both servers answer the same request with a JSON response tree. This
//! crate decides whether two such trees are equivalent ([`compare`]) and
//! whether a marker-paginated endpoint partitions its result set the same
//! way an unpaged fetch returns it ([`pagination`]).
//!
//! Neither module knows anything about specific endpoints: callers supply
//! the set of top-level fields expected to diverge and the name of the
//! field holding a paged collection.

pub mod compare;
pub mod pagination;

pub use compare::{
    compare_values, equal, shape_of, CompareOptions, ComparisonResult, DiffCategory, Difference,
    DEFAULT_IGNORED_FIELDS,
};
pub use pagination::{
    follow_markers, verify_partition, verify_response_partition, PagedResult, PaginationError,
    PartitionOrder, PartitionReport, PartitionViolation, DEFAULT_MAX_PAGES,
};
