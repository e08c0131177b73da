use async_trait::async_trait;

use crate::error::StoreError;
use crate::filter::RecordFilter;
use crate::models::{CustomerRecord, NewCustomerRecord};

/// Persistence for customer records. Deleted records never come back from `find` or `get`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<CustomerRecord>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<CustomerRecord>, StoreError>;

    async fn create(&self, record: &NewCustomerRecord) -> Result<i64, StoreError>;

    /// Returns `false` when no live record has this id.
    async fn update(&self, id: i64, record: &NewCustomerRecord) -> Result<bool, StoreError>;

    /// Returns `false` when no live record has this id.
    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError>;
}
