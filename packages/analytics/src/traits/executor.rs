//! Statement execution seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::ir::render::SqlStatement;
use crate::types::value::Record;

/// Runs a rendered statement and returns raw rows keyed by column name.
///
/// Errors are surfaced as [`crate::error::AnalyticsError::Execution`] and
/// never retried.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn fetch_all(&self, statement: &SqlStatement) -> Result<Vec<Record>>;
}
