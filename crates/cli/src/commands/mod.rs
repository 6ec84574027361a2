pub(crate) mod check;
pub(crate) mod query;
pub(crate) mod replay;
pub(crate) mod schema;
