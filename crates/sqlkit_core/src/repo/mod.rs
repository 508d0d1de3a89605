//! Repository layer over the connection manager.
//!
//! # Responsibility
//! - Offer table-scoped CRUD without hand-written SQL.
//! - Keep identifier quoting and key binding in one place.
//!
//! # Invariants
//! - Repositories borrow a `Database`; they never own or close it.
//! - A missing row is `None` for `find` and an error only for `find_or_fail`.

pub mod record_repo;
