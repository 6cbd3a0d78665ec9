//! MongoDB driver-backed executor
//!
//! Dispatches each descriptor type to the matching driver call:
//! - Read: find, findOne, count (server or client), distinct
//! - Write: insert, update, delete (one or many)
//! - Aggregate: aggregate, with cursor sort/skip/limit appended as stages

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{
    AggregateOptions, Collation, CountOptions, FindOptions, Hint, ReadConcern, ReadPreference,
    SelectionCriteria, UpdateModifications, UpdateOptions,
};
use mongodb::{Collection, Database};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::QueryExecutor;
use super::convert::{json_to_document, json_to_documents};
use super::result::{ExecutionResult, ExecutionStats, ResultData};
use crate::connection::ConnectionManager;
use crate::error::{ExecutionError, Result};
use crate::parser::{OperationDescriptor, OperationType, QueryOptions};

/// Executor backed by a live MongoDB connection
#[derive(Clone)]
pub struct MongoExecutor {
    /// Connection manager
    connection: Arc<RwLock<ConnectionManager>>,
}

impl MongoExecutor {
    /// Create a new executor over a (connected) connection manager
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection: Arc::new(RwLock::new(connection)),
        }
    }

    /// Get database handle
    pub async fn get_database(&self) -> Result<Database> {
        let conn = self.connection.read().await;
        conn.default_database()
    }

    /// Close the underlying connection
    pub async fn shutdown(&self) -> Result<()> {
        self.connection.write().await.disconnect().await
    }

    async fn execute_find(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
        limit_one: bool,
    ) -> Result<ExecutionResult> {
        let filter = json_to_document(&descriptor.data)?;
        let mut options = build_find_options(&descriptor.options)?;
        if limit_one {
            options.limit = Some(1);
        }
        debug!(
            "Executing find on collection '{}' with filter: {:?}",
            descriptor.collection, filter
        );

        let cursor = coll.find(filter).with_options(options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;

        let returned = docs.len();
        let data = if limit_one {
            docs.into_iter()
                .next()
                .map(ResultData::Document)
                .unwrap_or(ResultData::None)
        } else {
            ResultData::Documents(docs)
        };

        Ok(ExecutionResult::success(
            data,
            ExecutionStats {
                documents_returned: returned,
                ..Default::default()
            },
        ))
    }

    async fn execute_count(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        let filter = json_to_document(&descriptor.data)?;

        let count = if descriptor.is_client_count() {
            let options = build_find_options(&descriptor.options)?;
            let mut cursor = coll.find(filter).with_options(options).await?;
            let mut count = 0u64;
            while cursor.advance().await? {
                count += 1;
            }
            count
        } else {
            let options = build_count_options(&descriptor.options)?;
            coll.count_documents(filter).with_options(options).await?
        };

        Ok(ExecutionResult::success(
            ResultData::Count(count),
            ExecutionStats::default(),
        ))
    }

    async fn execute_distinct(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        let field = descriptor.data["field"].as_str().unwrap_or_default();
        if field.is_empty() {
            return Err(
                ExecutionError::InvalidPayload("distinct requires a field name".to_string()).into(),
            );
        }
        let filter = json_to_document(&descriptor.data["filter"])?;

        let values = coll.distinct(field, filter).await?;
        let returned = values.len();

        Ok(ExecutionResult::success(
            ResultData::Values(values),
            ExecutionStats {
                documents_returned: returned,
                ..Default::default()
            },
        ))
    }

    async fn execute_aggregate(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        let pipeline = build_pipeline(&descriptor.data, &descriptor.options)?;
        let options = build_aggregate_options(&descriptor.options)?;
        debug!(
            "Executing aggregate on collection '{}' with {} stage(s)",
            descriptor.collection,
            pipeline.len()
        );

        let cursor = coll.aggregate(pipeline).with_options(options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        let returned = docs.len();

        Ok(ExecutionResult::success(
            ResultData::Documents(docs),
            ExecutionStats {
                documents_returned: returned,
                ..Default::default()
            },
        ))
    }

    async fn execute_insert(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        if descriptor.options.many {
            let documents = json_to_documents(&descriptor.data)?;
            let count = documents.len();
            let result = coll.insert_many(documents).await?;

            let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
            ids.sort_by_key(|(index, _)| *index);

            Ok(ExecutionResult::success(
                ResultData::InsertMany {
                    inserted_ids: ids.into_iter().map(|(_, id)| id).collect(),
                },
                ExecutionStats {
                    documents_affected: Some(count as u64),
                    ..Default::default()
                },
            ))
        } else {
            let document = json_to_document(&descriptor.data)?;
            let result = coll.insert_one(document).await?;

            Ok(ExecutionResult::success(
                ResultData::InsertOne {
                    inserted_id: result.inserted_id,
                },
                ExecutionStats {
                    documents_affected: Some(1),
                    ..Default::default()
                },
            ))
        }
    }

    async fn execute_update(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        let filter = json_to_document(&descriptor.data["filter"])?;
        let update = build_update(&descriptor.data["update"])?;

        let mut options = UpdateOptions::default();
        options.upsert = descriptor.options.upsert;

        let result = if descriptor.options.many {
            coll.update_many(filter, update).with_options(options).await?
        } else {
            coll.update_one(filter, update).with_options(options).await?
        };

        Ok(ExecutionResult::success(
            ResultData::Update {
                matched: result.matched_count,
                modified: result.modified_count,
                upserted_id: result.upserted_id,
            },
            ExecutionStats {
                documents_affected: Some(result.modified_count),
                ..Default::default()
            },
        ))
    }

    async fn execute_delete(
        &self,
        coll: &Collection<Document>,
        descriptor: &OperationDescriptor,
    ) -> Result<ExecutionResult> {
        let filter = json_to_document(&descriptor.data)?;

        let result = if descriptor.options.many {
            coll.delete_many(filter).await?
        } else {
            coll.delete_one(filter).await?
        };

        Ok(ExecutionResult::success(
            ResultData::Delete {
                deleted: result.deleted_count,
            },
            ExecutionStats {
                documents_affected: Some(result.deleted_count),
                ..Default::default()
            },
        ))
    }
}

#[async_trait]
impl QueryExecutor for MongoExecutor {
    async fn execute(&self, descriptor: &OperationDescriptor) -> Result<ExecutionResult> {
        let start = Instant::now();
        let db = self.get_database().await?;
        let coll: Collection<Document> = db.collection(&descriptor.collection);

        let result = match descriptor.op_type {
            OperationType::Find => self.execute_find(&coll, descriptor, false).await,
            OperationType::FindOne => self.execute_find(&coll, descriptor, true).await,
            OperationType::Count => self.execute_count(&coll, descriptor).await,
            OperationType::Distinct => self.execute_distinct(&coll, descriptor).await,
            OperationType::Aggregate => self.execute_aggregate(&coll, descriptor).await,
            OperationType::Insert => self.execute_insert(&coll, descriptor).await,
            OperationType::Update => self.execute_update(&coll, descriptor).await,
            OperationType::Delete => self.execute_delete(&coll, descriptor).await,
        };

        let mut exec_result = result?;
        exec_result.stats.execution_time_ms = start.elapsed().as_millis() as u64;
        exec_result.processing_mode = descriptor.options.processing_mode;

        info!(
            "Executed {} on '{}' in {} ms",
            descriptor.op_type, descriptor.collection, exec_result.stats.execution_time_ms
        );
        Ok(exec_result)
    }
}

/// Build driver find options from the descriptor options
pub fn build_find_options(options: &QueryOptions) -> Result<FindOptions> {
    let mut find_options = FindOptions::default();

    find_options.sort = options.sort.as_ref().map(json_to_document).transpose()?;
    find_options.projection = options.projection.as_ref().map(json_to_document).transpose()?;
    find_options.limit = options.limit;
    find_options.skip = options.skip.and_then(|s| u64::try_from(s).ok());
    find_options.hint = options.hint.as_ref().map(build_hint).transpose()?;
    find_options.comment = options.comment.clone().map(Bson::String);
    find_options.max_time = options.max_time_ms.map(millis);
    find_options.allow_disk_use = options.allow_disk_use;
    find_options.batch_size = options.batch_size.and_then(|b| u32::try_from(b).ok());
    find_options.collation = options.collation.as_ref().map(build_collation).transpose()?;
    find_options.read_concern = build_read_concern(options);
    find_options.selection_criteria = options
        .read_preference
        .as_deref()
        .map(build_selection_criteria)
        .transpose()?;
    find_options.no_cursor_timeout = options.no_cursor_timeout;
    find_options.return_key = options.return_key;
    find_options.show_record_id = options.show_record_id;

    Ok(find_options)
}

/// Build driver count options from the descriptor options
pub fn build_count_options(options: &QueryOptions) -> Result<CountOptions> {
    let mut count_options = CountOptions::default();

    count_options.hint = options.hint.as_ref().map(build_hint).transpose()?;
    count_options.comment = options.comment.clone().map(Bson::String);
    count_options.max_time = options.max_time_ms.map(millis);
    count_options.collation = options.collation.as_ref().map(build_collation).transpose()?;
    count_options.read_concern = build_read_concern(options);
    count_options.selection_criteria = options
        .read_preference
        .as_deref()
        .map(build_selection_criteria)
        .transpose()?;

    Ok(count_options)
}

/// Build driver aggregate options from the descriptor options
pub fn build_aggregate_options(options: &QueryOptions) -> Result<AggregateOptions> {
    let mut aggregate_options = AggregateOptions::default();

    aggregate_options.hint = options.hint.as_ref().map(build_hint).transpose()?;
    aggregate_options.comment = options.comment.clone().map(Bson::String);
    aggregate_options.max_time = options.max_time_ms.map(millis);
    aggregate_options.allow_disk_use = options.allow_disk_use;
    aggregate_options.batch_size = options.batch_size.and_then(|b| u32::try_from(b).ok());
    aggregate_options.collation = options.collation.as_ref().map(build_collation).transpose()?;
    aggregate_options.read_concern = build_read_concern(options);
    aggregate_options.selection_criteria = options
        .read_preference
        .as_deref()
        .map(build_selection_criteria)
        .transpose()?;

    Ok(aggregate_options)
}

/// Pipeline stages from the descriptor data, followed by any
/// `$sort` / `$skip` / `$limit` taken from the cursor chain
pub fn build_pipeline(data: &Value, options: &QueryOptions) -> Result<Vec<Document>> {
    let mut pipeline = json_to_documents(data)?;

    if let Some(sort) = &options.sort {
        pipeline.push(doc! { "$sort": json_to_document(sort)? });
    }
    if let Some(skip) = options.skip {
        pipeline.push(doc! { "$skip": skip });
    }
    if let Some(limit) = options.limit {
        pipeline.push(doc! { "$limit": limit });
    }

    Ok(pipeline)
}

/// Update document or update pipeline
fn build_update(value: &Value) -> Result<UpdateModifications> {
    match value {
        Value::Array(_) => Ok(UpdateModifications::Pipeline(json_to_documents(value)?)),
        _ => Ok(UpdateModifications::Document(json_to_document(value)?)),
    }
}

fn build_hint(value: &Value) -> Result<Hint> {
    match value {
        Value::String(name) => Ok(Hint::Name(name.clone())),
        other => Ok(Hint::Keys(json_to_document(other)?)),
    }
}

fn build_collation(value: &Value) -> Result<Collation> {
    let document = json_to_document(value)?;
    mongodb::bson::from_document(document)
        .map_err(|e| ExecutionError::InvalidPayload(format!("invalid collation: {e}")).into())
}

fn build_read_concern(options: &QueryOptions) -> Option<ReadConcern> {
    options
        .read_concern
        .as_ref()
        .map(|rc| ReadConcern::custom(rc.level.clone()))
}

fn build_selection_criteria(mode: &str) -> Result<SelectionCriteria> {
    let preference: ReadPreference = mongodb::bson::from_document(doc! { "mode": mode })
        .map_err(|e| ExecutionError::InvalidPayload(format!("invalid read preference: {e}")))?;
    Ok(SelectionCriteria::ReadPreference(preference))
}

fn millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}
