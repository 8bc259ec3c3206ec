//! Remote schema discovery and caching.
//!
//! Model descriptors are assembled from the store's own meta-models: the model
//! row, its field rows, and (for selection fields) either materialized choice
//! rows or the legacy inline choice spec. One descriptor costs one model read,
//! one field read, and one extra read per field with materialized choices;
//! after that the descriptor is served from the generic cache for the process
//! lifetime, invalidated only by an explicit [`SchemaCache::invalidate`].

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::cache::{Cache, CacheFailure, CachedValue};
use crate::domain::Domain;
use crate::error::{OrmError, OrmResult, RuntimeError, SchemaError};
use crate::transport::{SearchOptions, Transport, WireRecord};
use crate::value::{wire, RecordId};

use super::{Choice, Field, FieldKind, Model, Selection};

/// Meta-model holding one row per remote model.
pub const MODEL_META: &str = "ir.model";
/// Meta-model holding one row per remote field.
pub const FIELD_META: &str = "ir.model.fields";
/// Meta-model holding materialized selection choices.
pub const SELECTION_META: &str = "ir.model.fields.selection";

/// Compute-if-absent cache of remote model descriptors.
pub struct SchemaCache {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
}

impl SchemaCache {
    /// Creates a schema cache over the given transport and cache backend.
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn Cache>) -> Self {
        Self { transport, cache }
    }

    /// Returns the descriptor for `model_name`, fetching it on first access.
    ///
    /// # Errors
    ///
    /// `SchemaError::ModelNotFound` when the store has no such model;
    /// `RuntimeError::CacheAccessFailed` when the cache backend itself fails.
    /// Failed lookups are not cached.
    pub fn model(&self, model_name: &str) -> OrmResult<Arc<Model>> {
        let key = model_cache_key(&self.transport.identifier(), model_name);

        let cached = self.cache.get_or_compute(&key, &mut || {
            debug!(model = model_name, "fetching remote model descriptor");
            let model = fetch_model(self.transport.as_ref(), model_name)?;
            Ok(Arc::new(model) as CachedValue)
        });

        match cached {
            Ok(value) => value
                .downcast::<Model>()
                .map_err(|_| OrmError::internal(format!("schema cache entry \"{key}\" holds a foreign type"))),
            Err(CacheFailure::Compute(err)) => Err(err),
            Err(CacheFailure::Backend(err)) => Err(RuntimeError::CacheAccessFailed {
                key: err.key,
                message: err.message,
            }
            .into()),
        }
    }

    /// Drops the cached descriptor for `model_name`.
    pub fn invalidate(&self, model_name: &str) {
        let key = model_cache_key(&self.transport.identifier(), model_name);
        self.cache.delete(&key);
    }
}

/// Deterministic, collision-resistant cache key: store identity and model
/// name are hashed together so distinct stores never share descriptors.
fn model_cache_key(store_identifier: &str, model_name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(store_identifier.as_bytes());
    hasher.update(b"\0");
    hasher.update(model_name.as_bytes());
    format!("schema.model.{}", hasher.finalize().to_hex())
}

fn fetch_model(transport: &dyn Transport, model_name: &str) -> OrmResult<Model> {
    let mut options = SearchOptions::default();
    options.limit = Some(1);
    let rows = transport.find_by(MODEL_META, Some(&Domain::eq("model", model_name)), &options)?;
    let Some(model_row) = rows.into_iter().next() else {
        return Err(SchemaError::ModelNotFound {
            model: model_name.to_string(),
        }
        .into());
    };

    let model_id = record_id_of(&model_row, MODEL_META)?;
    let field_rows = transport.find_by(
        FIELD_META,
        Some(&Domain::eq("model_id", model_id.as_i64())),
        &SearchOptions::default(),
    )?;

    let mut fields = std::collections::BTreeMap::new();
    for row in field_rows {
        let field = build_field(transport, &row)?;
        fields.insert(field.name.clone(), field);
    }

    Ok(Model {
        id: model_id,
        name: str_of(&model_row, "model").unwrap_or(model_name).to_string(),
        display_name: str_of(&model_row, "name").unwrap_or_default().to_string(),
        transient: bool_of(&model_row, "transient"),
        fields,
    })
}

fn build_field(transport: &dyn Transport, row: &WireRecord) -> OrmResult<Field> {
    let field_id = record_id_of(row, FIELD_META)?;
    let name = str_of(row, "name").unwrap_or_default().to_string();
    let kind: FieldKind = str_of(row, "ttype")
        .unwrap_or_default()
        .parse()
        .unwrap_or(FieldKind::Other(String::new()));

    let selection_ids = row
        .get("selection_ids")
        .map(wire::record_ids)
        .unwrap_or_default();

    let choices = if selection_ids.is_empty() {
        str_of(row, "selection").map_or_else(Vec::new, parse_inline_selection)
    } else {
        fetch_choices(transport, field_id)?
    };

    Ok(Field {
        id: field_id,
        name,
        display_name: str_of(row, "display_name").map(str::to_string),
        kind,
        required: bool_of(row, "required"),
        read_only: bool_of(row, "readonly"),
        size: row.get("size").and_then(wire::opt_i64).and_then(|size| {
            u32::try_from(size).ok().filter(|size| *size > 0)
        }),
        selection: (!choices.is_empty()).then(|| Selection::new(choices)),
        target_model: str_of(row, "relation").map(str::to_string),
        mapped_by: str_of(row, "relation_field").map(str::to_string),
    })
}

fn fetch_choices(transport: &dyn Transport, field_id: RecordId) -> OrmResult<Vec<Choice>> {
    let rows = transport.find_by(
        SELECTION_META,
        Some(&Domain::eq("field_id", field_id.as_i64())),
        &SearchOptions::default(),
    )?;

    Ok(rows
        .iter()
        .map(|row| Choice {
            id: row.get("id").and_then(wire::opt_record_id),
            name: str_of(row, "name").unwrap_or_default().to_string(),
            value: str_of(row, "value").unwrap_or_default().to_string(),
        })
        .collect())
}

/// Parses the legacy inline choice spec: `[('value', 'Label'), …]`.
fn parse_inline_selection(spec: &str) -> Vec<Choice> {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    let pair = PAIR.get_or_init(|| {
        Regex::new(r"\(\s*'([^']*)'\s*,\s*'([^']*)'\s*\)").expect("inline selection pattern")
    });

    pair.captures_iter(spec)
        .map(|captures| Choice::new(&captures[1], &captures[2]))
        .collect()
}

fn record_id_of(row: &WireRecord, meta_model: &str) -> OrmResult<RecordId> {
    row.get("id").and_then(wire::opt_record_id).ok_or_else(|| {
        OrmError::internal(format!("meta-model {meta_model} returned a row without id"))
    })
}

fn str_of<'a>(row: &'a WireRecord, key: &str) -> Option<&'a str> {
    row.get(key).and_then(wire::opt_str).filter(|s| !s.is_empty())
}

fn bool_of(row: &WireRecord, key: &str) -> bool {
    row.get(key).and_then(wire::opt_bool).unwrap_or(false)
}
