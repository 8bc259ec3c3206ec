//! Per-type query surface over the engine.
//!
//! A repository pairs one entity type with its remote model and exposes the
//! read operations: fetch by id (`get`/`find`), record queries (`find_by`),
//! id-only queries (`search`), `count` and `exists`. Records coming back are
//! denormalized through the unit of work, so identity mapping and lazy
//! associations apply.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::domain::Domain;
use crate::error::{OrmError, OrmResult};
use crate::mapping::{ClassMetadata, Entity};
use crate::object::Obj;
use crate::schema::Model;
use crate::transport::{Order, SearchOptions, WireRecord};
use crate::value::RecordId;

use super::Engine;

/// Typed repository for one mapped entity type.
pub struct Repository<'e, T: Entity> {
    engine: &'e Engine,
    metadata: Arc<ClassMetadata>,
    model: Arc<Model>,
    marker: PhantomData<fn() -> T>,
}

impl<'e, T: Entity> Repository<'e, T> {
    pub(crate) fn new(engine: &'e Engine) -> OrmResult<Self> {
        let metadata = engine.metadata::<T>()?;
        let model_name = metadata.model_name_or_err()?.to_string();
        let model = engine.schema().model(&model_name)?;
        Ok(Self {
            engine,
            metadata,
            model,
            marker: PhantomData,
        })
    }

    /// The repository's class metadata.
    #[must_use]
    pub fn metadata(&self) -> &ClassMetadata {
        &self.metadata
    }

    /// The remote model descriptor.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The remote model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    fn load_record(&self, id: RecordId) -> OrmResult<Option<WireRecord>> {
        Ok(self.engine.transport().find(
            self.model_name(),
            id,
            &self.metadata.field_names(),
        )?)
    }

    /// Fetches a record by id.
    ///
    /// # Errors
    ///
    /// `OrmError::RecordNotFound` when the store has no such record.
    pub fn get(&self, id: RecordId) -> OrmResult<Obj<T>> {
        let record = self.load_record(id)?.ok_or_else(|| OrmError::RecordNotFound {
            model: self.model_name().to_string(),
            id,
        })?;
        self.engine.denormalize_record(&self.metadata, &record)
    }

    /// Fetches a record by id, returning `None` when it does not exist.
    pub fn find(&self, id: RecordId) -> OrmResult<Option<Obj<T>>> {
        match self.load_record(id)? {
            Some(record) => Ok(Some(
                self.engine.denormalize_record(&self.metadata, &record)?,
            )),
            None => Ok(None),
        }
    }

    /// Fetches all records matching `domain`.
    pub fn find_by(
        &self,
        domain: Option<&Domain>,
        orders: &[(&str, Order)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> OrmResult<Vec<Obj<T>>> {
        let options = self.prepare_options(orders, limit, offset);
        let records = self
            .engine
            .transport()
            .find_by(self.model_name(), domain, &options)?;

        records
            .iter()
            .map(|record| self.engine.denormalize_record(&self.metadata, record))
            .collect()
    }

    /// Fetches the first record matching `domain`.
    pub fn find_one_by(
        &self,
        domain: Option<&Domain>,
        orders: &[(&str, Order)],
    ) -> OrmResult<Option<Obj<T>>> {
        Ok(self.find_by(domain, orders, Some(1), None)?.into_iter().next())
    }

    /// Fetches all records of the model.
    pub fn find_all(
        &self,
        orders: &[(&str, Order)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> OrmResult<Vec<Obj<T>>> {
        self.find_by(None, orders, limit, offset)
    }

    /// Returns ids of records matching `domain`, without fetching records.
    pub fn search(
        &self,
        domain: Option<&Domain>,
        orders: &[(&str, Order)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> OrmResult<Vec<RecordId>> {
        let mut options = self.prepare_options(orders, limit, offset);
        options.fields = Vec::new();
        Ok(self
            .engine
            .transport()
            .search(self.model_name(), domain, &options)?)
    }

    /// Returns the first matching id.
    pub fn search_one(
        &self,
        domain: Option<&Domain>,
        orders: &[(&str, Order)],
    ) -> OrmResult<Option<RecordId>> {
        Ok(self.search(domain, orders, Some(1), None)?.into_iter().next())
    }

    /// Returns all ids of the model.
    pub fn search_all(
        &self,
        orders: &[(&str, Order)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> OrmResult<Vec<RecordId>> {
        self.search(None, orders, limit, offset)
    }

    /// Counts records matching `domain`.
    pub fn count(&self, domain: Option<&Domain>) -> OrmResult<u64> {
        Ok(self.engine.transport().count(self.model_name(), domain)?)
    }

    /// Tests whether a record exists.
    pub fn exists(&self, id: RecordId) -> OrmResult<bool> {
        Ok(self.engine.transport().exists(self.model_name(), id)?)
    }

    /// Builds the query options: the mapped field list (unless it is only the
    /// identifier), normalized order terms, and pagination.
    fn prepare_options(
        &self,
        orders: &[(&str, Order)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> SearchOptions {
        let mut options = SearchOptions::default();

        let fields = self.metadata.field_names();
        if !(fields.is_empty() || fields == ["id"]) {
            options.fields = fields;
        }

        if !orders.is_empty() {
            let terms: Vec<String> = orders
                .iter()
                .map(|(field, direction)| format!("{field} {direction}"))
                .collect();
            options.order = Some(terms.join(", "));
        }

        options.limit = limit;
        options.offset = offset.filter(|offset| *offset > 0);
        options
    }
}
