//! In-memory transport backend.
//!
//! A thread-safe miniature record store used by tests and embedded setups. It
//! honors the parts of the store contract the engine relies on: per-model
//! record tables, id assignment, field projection with the `false` null
//! sentinel, equality domains, order/limit/offset, and server-side
//! application of to-many link commands. Schema meta-rows can be seeded so the
//! schema cache works against it unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use serde_json::Value;
use tracing::trace;

use crate::domain::Domain;
use crate::schema::cache::{FIELD_META, MODEL_META, SELECTION_META};
use crate::value::RecordId;

use super::{SearchOptions, Transport, TransportError, WireRecord};

fn lock_err(context: &'static str) -> TransportError {
    TransportError::ConnectionFailed {
        message: format!("poisoned lock: {context}"),
    }
}

fn server_err(code: u32, message: impl Into<String>) -> TransportError {
    TransportError::ServerError {
        code,
        message: message.into(),
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, BTreeMap<RecordId, WireRecord>>,
    next_id: HashMap<String, i64>,
}

impl StoreState {
    fn allocate_id(&mut self, model: &str) -> RecordId {
        let next = self.next_id.entry(model.to_string()).or_insert(1);
        let id = RecordId::new(*next);
        *next += 1;
        id
    }

    /// Resolves the declared kind and relation target of `field` from the
    /// seeded schema rows, when present.
    fn relation_info(&self, model: &str, field: &str) -> Option<(String, String)> {
        let models = self.tables.get(MODEL_META)?;
        let model_id = models
            .values()
            .find(|row| row.get("model").and_then(Value::as_str) == Some(model))?
            .get("id")
            .and_then(Value::as_i64)?;

        let fields = self.tables.get(FIELD_META)?;
        let row = fields.values().find(|row| {
            row.get("model_id").and_then(Value::as_i64) == Some(model_id)
                && row.get("name").and_then(Value::as_str) == Some(field)
        })?;

        let ttype = row.get("ttype").and_then(Value::as_str)?.to_string();
        let relation = row.get("relation").and_then(Value::as_str)?.to_string();
        Some((ttype, relation))
    }
}

/// Snapshot of per-operation call counters, for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub finds: usize,
    pub searches: usize,
    pub counts: usize,
    pub exists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct CallCounters {
    finds: AtomicUsize,
    searches: AtomicUsize,
    counts: AtomicUsize,
    exists: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

/// Declarative schema seed for one remote model.
#[derive(Debug, Clone)]
pub struct ModelSeed {
    name: String,
    display_name: String,
    transient: bool,
    fields: Vec<FieldSeed>,
}

impl ModelSeed {
    /// Starts a seed for `name`. An integer read-only `id` field is always
    /// included, as on a real store.
    #[must_use]
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            transient: false,
            fields: vec![FieldSeed::new("id", "integer").read_only()],
        }
    }

    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldSeed) -> Self {
        self.fields.push(field);
        self
    }
}

/// Declarative schema seed for one remote field.
#[derive(Debug, Clone)]
pub struct FieldSeed {
    name: String,
    ttype: String,
    required: bool,
    read_only: bool,
    size: Option<u32>,
    relation: Option<String>,
    relation_field: Option<String>,
    inline_selection: Option<String>,
    choices: Vec<(String, String)>,
}

impl FieldSeed {
    /// Creates a field seed with the store's kind name (`"char"`,
    /// `"many2one"`, …).
    #[must_use]
    pub fn new(name: &str, ttype: &str) -> Self {
        Self {
            name: name.to_string(),
            ttype: ttype.to_string(),
            required: false,
            read_only: false,
            size: None,
            relation: None,
            relation_field: None,
            inline_selection: None,
            choices: Vec::new(),
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the association target (and inverse field, for one-to-many).
    #[must_use]
    pub fn relation(mut self, target_model: &str, mapped_by: Option<&str>) -> Self {
        self.relation = Some(target_model.to_string());
        self.relation_field = mapped_by.map(str::to_string);
        self
    }

    /// Materialized selection choices, served via the selection meta-model.
    #[must_use]
    pub fn choices(mut self, choices: &[(&str, &str)]) -> Self {
        self.choices = choices
            .iter()
            .map(|(value, name)| ((*value).to_string(), (*name).to_string()))
            .collect();
        self
    }

    /// Legacy inline selection spec, served verbatim on the field row.
    #[must_use]
    pub fn inline_selection(mut self, spec: &str) -> Self {
        self.inline_selection = Some(spec.to_string());
        self
    }
}

/// In-memory implementation of [`Transport`].
pub struct MemoryTransport {
    name: String,
    state: RwLock<StoreState>,
    calls: CallCounters,
    update_log: Mutex<Vec<(String, RecordId, WireRecord)>>,
    create_log: Mutex<Vec<(String, WireRecord)>>,
}

impl MemoryTransport {
    /// Creates an empty store under the given instance name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(StoreState::default()),
            calls: CallCounters::default(),
            update_log: Mutex::new(Vec::new()),
            create_log: Mutex::new(Vec::new()),
        }
    }

    /// Seeds the schema meta-rows describing one model, so the schema cache
    /// can discover it.
    pub fn seed_model(&self, seed: &ModelSeed) -> Result<(), TransportError> {
        let mut state = self.state.write().map_err(|_| lock_err("seed_model"))?;

        let model_id = state.allocate_id(MODEL_META);
        let mut model_row = WireRecord::new();
        model_row.insert("id".to_string(), model_id.as_i64().into());
        model_row.insert("model".to_string(), seed.name.clone().into());
        model_row.insert("name".to_string(), seed.display_name.clone().into());
        model_row.insert("transient".to_string(), seed.transient.into());
        state
            .tables
            .entry(MODEL_META.to_string())
            .or_default()
            .insert(model_id, model_row);

        for field in &seed.fields {
            let field_id = state.allocate_id(FIELD_META);
            let mut selection_ids = Vec::new();

            for (value, label) in &field.choices {
                let choice_id = state.allocate_id(SELECTION_META);
                let mut choice_row = WireRecord::new();
                choice_row.insert("id".to_string(), choice_id.as_i64().into());
                choice_row.insert("field_id".to_string(), field_id.as_i64().into());
                choice_row.insert("name".to_string(), label.clone().into());
                choice_row.insert("value".to_string(), value.clone().into());
                state
                    .tables
                    .entry(SELECTION_META.to_string())
                    .or_default()
                    .insert(choice_id, choice_row);
                selection_ids.push(Value::from(choice_id.as_i64()));
            }

            let mut row = WireRecord::new();
            row.insert("id".to_string(), field_id.as_i64().into());
            row.insert("model_id".to_string(), model_id.as_i64().into());
            row.insert("name".to_string(), field.name.clone().into());
            row.insert("ttype".to_string(), field.ttype.clone().into());
            row.insert("required".to_string(), field.required.into());
            row.insert("readonly".to_string(), field.read_only.into());
            row.insert(
                "size".to_string(),
                field.size.map_or(Value::Bool(false), Value::from),
            );
            row.insert(
                "relation".to_string(),
                field
                    .relation
                    .clone()
                    .map_or(Value::Bool(false), Value::from),
            );
            row.insert(
                "relation_field".to_string(),
                field
                    .relation_field
                    .clone()
                    .map_or(Value::Bool(false), Value::from),
            );
            row.insert("selection_ids".to_string(), Value::Array(selection_ids));
            row.insert(
                "selection".to_string(),
                field
                    .inline_selection
                    .clone()
                    .map_or(Value::Bool(false), Value::from),
            );
            state
                .tables
                .entry(FIELD_META.to_string())
                .or_default()
                .insert(field_id, row);
        }

        Ok(())
    }

    /// Inserts a raw record with an explicit id (fixtures).
    pub fn seed_record(
        &self,
        model: &str,
        id: RecordId,
        record: WireRecord,
    ) -> Result<(), TransportError> {
        let mut state = self.state.write().map_err(|_| lock_err("seed_record"))?;
        let mut record = record;
        record.insert("id".to_string(), id.as_i64().into());
        let next = state.next_id.entry(model.to_string()).or_insert(1);
        *next = (*next).max(id.as_i64() + 1);
        state
            .tables
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
        Ok(())
    }

    /// Counter snapshot.
    #[must_use]
    pub fn calls(&self) -> CallStats {
        CallStats {
            finds: self.calls.finds.load(Ordering::SeqCst),
            searches: self.calls.searches.load(Ordering::SeqCst),
            counts: self.calls.counts.load(Ordering::SeqCst),
            exists: self.calls.exists.load(Ordering::SeqCst),
            creates: self.calls.creates.load(Ordering::SeqCst),
            updates: self.calls.updates.load(Ordering::SeqCst),
            deletes: self.calls.deletes.load(Ordering::SeqCst),
        }
    }

    /// Update payloads in call order, for payload assertions.
    #[must_use]
    pub fn update_log(&self) -> Vec<(String, RecordId, WireRecord)> {
        self.update_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Create payloads in call order.
    #[must_use]
    pub fn create_log(&self) -> Vec<(String, WireRecord)> {
        self.create_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Applies an incoming write payload, resolving link commands on to-many
    /// fields the way the real store does.
    fn apply_write(
        state: &mut StoreState,
        model: &str,
        data: WireRecord,
        existing: Option<&WireRecord>,
    ) -> Result<WireRecord, TransportError> {
        let mut resolved = WireRecord::new();

        for (field, value) in data {
            if !looks_like_commands(&value) {
                resolved.insert(field, value);
                continue;
            }

            let Some((ttype, relation)) = state.relation_info(model, &field) else {
                // No schema seeded for this field; store the raw commands.
                resolved.insert(field, value);
                continue;
            };
            if ttype != "many2many" && ttype != "one2many" {
                resolved.insert(field, value);
                continue;
            }

            let mut ids: Vec<i64> = existing
                .and_then(|record| record.get(&field))
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();

            let Value::Array(commands) = value else {
                resolved.insert(field, value);
                continue;
            };
            for command in commands {
                apply_link_command(state, &relation, &command, &mut ids)?;
            }

            resolved.insert(field, ids.into_iter().map(Value::from).collect());
        }

        Ok(resolved)
    }
}

/// Command lists are arrays of `[op, id, data]` triplets with `op` in 0..=6.
fn looks_like_commands(value: &Value) -> bool {
    match value {
        Value::Array(items) if !items.is_empty() => items.iter().all(|item| {
            item.as_array().is_some_and(|triplet| {
                triplet.len() == 3
                    && triplet[0].as_u64().is_some_and(|op| op <= 6)
            })
        }),
        _ => false,
    }
}

fn apply_link_command(
    state: &mut StoreState,
    relation: &str,
    command: &Value,
    ids: &mut Vec<i64>,
) -> Result<(), TransportError> {
    let triplet = command
        .as_array()
        .ok_or_else(|| server_err(400, "malformed link command"))?;
    let op = triplet[0].as_u64().unwrap_or(u64::MAX);
    let id = triplet[1].as_i64().unwrap_or_default();

    match op {
        // create
        0 => {
            let data = triplet[2]
                .as_object()
                .cloned()
                .ok_or_else(|| server_err(400, "create command without data"))?;
            let resolved = MemoryTransport::apply_write(state, relation, data, None)?;
            let new_id = state.allocate_id(relation);
            let mut record = resolved;
            record.insert("id".to_string(), new_id.as_i64().into());
            state
                .tables
                .entry(relation.to_string())
                .or_default()
                .insert(new_id, record);
            ids.push(new_id.as_i64());
        }
        // update
        1 => {
            let data = triplet[2]
                .as_object()
                .cloned()
                .ok_or_else(|| server_err(400, "update command without data"))?;
            let existing = state
                .tables
                .get(relation)
                .and_then(|table| table.get(&RecordId::new(id)))
                .cloned()
                .ok_or_else(|| server_err(404, format!("record {id} of {relation} not found")))?;
            let resolved = MemoryTransport::apply_write(state, relation, data, Some(&existing))?;
            if let Some(record) = state
                .tables
                .get_mut(relation)
                .and_then(|table| table.get_mut(&RecordId::new(id)))
            {
                for (key, value) in resolved {
                    record.insert(key, value);
                }
            }
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        // delete
        2 => {
            ids.retain(|linked| *linked != id);
            if let Some(table) = state.tables.get_mut(relation) {
                table.remove(&RecordId::new(id));
            }
        }
        // unlink
        3 => ids.retain(|linked| *linked != id),
        // link
        4 => {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        // clear
        5 => ids.clear(),
        // set
        6 => {
            *ids = triplet[2]
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
        }
        _ => return Err(server_err(400, format!("unknown link command op {op}"))),
    }

    Ok(())
}

fn eval_domain(domain: Option<&Domain>, record: &WireRecord) -> Result<bool, TransportError> {
    let Some(domain) = domain else {
        return Ok(true);
    };
    let Value::Array(clauses) = domain.as_json() else {
        return Err(server_err(400, "domain must be a clause list"));
    };

    for clause in clauses {
        let Some(parts) = clause.as_array().filter(|parts| parts.len() == 3) else {
            return Err(server_err(400, "malformed domain clause"));
        };
        let Some(field) = parts[0].as_str() else {
            return Err(server_err(400, "domain clause field must be a string"));
        };
        let operator = parts[1].as_str().unwrap_or("=");
        let expected = &parts[2];
        let actual = record.get(field).unwrap_or(&Value::Null);

        let matched = match operator {
            "=" => wire_eq(actual, expected),
            "!=" => !wire_eq(actual, expected),
            "in" => expected
                .as_array()
                .is_some_and(|values| values.iter().any(|value| wire_eq(actual, value))),
            other => {
                return Err(server_err(400, format!("unsupported domain operator \"{other}\"")))
            }
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Loose equality: numbers compare by value, everything else structurally.
fn wire_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering as O;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(O::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => O::Equal,
    }
}

fn sort_records(records: &mut [WireRecord], order: Option<&str>) {
    let Some(order) = order else {
        return;
    };
    let terms: Vec<(String, bool)> = order
        .split(',')
        .filter_map(|term| {
            let mut parts = term.split_whitespace();
            let field = parts.next()?.to_string();
            let descending = parts.next() == Some("desc");
            Some((field, descending))
        })
        .collect();

    records.sort_by(|a, b| {
        for (field, descending) in &terms {
            let ordering = compare_values(
                a.get(field).unwrap_or(&Value::Null),
                b.get(field).unwrap_or(&Value::Null),
            );
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn project(record: &WireRecord, fields: &[String]) -> WireRecord {
    if fields.is_empty() {
        return record.clone();
    }

    let mut projected = WireRecord::new();
    projected.insert(
        "id".to_string(),
        record.get("id").cloned().unwrap_or(Value::Null),
    );
    for field in fields {
        if field == "id" {
            continue;
        }
        // Missing scalar values read back as the store's null sentinel.
        let value = record.get(field).cloned().unwrap_or(Value::Bool(false));
        projected.insert(field.clone(), value);
    }
    projected
}

fn paginate<T>(items: Vec<T>, options: &SearchOptions) -> Vec<T> {
    let offset = options.offset.unwrap_or(0) as usize;
    let limit = options.limit.map_or(usize::MAX, |limit| limit as usize);
    items.into_iter().skip(offset).take(limit).collect()
}

impl Transport for MemoryTransport {
    fn identifier(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn find(
        &self,
        model: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<WireRecord>, TransportError> {
        self.calls.finds.fetch_add(1, Ordering::SeqCst);
        trace!(model, %id, "find");
        let state = self.state.read().map_err(|_| lock_err("find"))?;
        Ok(state
            .tables
            .get(model)
            .and_then(|table| table.get(&id))
            .map(|record| project(record, fields)))
    }

    fn find_by(
        &self,
        model: &str,
        domain: Option<&Domain>,
        options: &SearchOptions,
    ) -> Result<Vec<WireRecord>, TransportError> {
        self.calls.searches.fetch_add(1, Ordering::SeqCst);
        trace!(model, "find_by");
        let state = self.state.read().map_err(|_| lock_err("find_by"))?;
        let mut matches = Vec::new();
        if let Some(table) = state.tables.get(model) {
            for record in table.values() {
                if eval_domain(domain, record)? {
                    matches.push(record.clone());
                }
            }
        }
        sort_records(&mut matches, options.order.as_deref());
        let page = paginate(matches, options);
        Ok(page
            .iter()
            .map(|record| project(record, &options.fields))
            .collect())
    }

    fn search(
        &self,
        model: &str,
        domain: Option<&Domain>,
        options: &SearchOptions,
    ) -> Result<Vec<RecordId>, TransportError> {
        let mut options = options.clone();
        options.fields = vec!["id".to_string()];
        let records = self.find_by(model, domain, &options)?;
        Ok(records
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_i64))
            .map(RecordId::new)
            .collect())
    }

    fn count(&self, model: &str, domain: Option<&Domain>) -> Result<u64, TransportError> {
        self.calls.counts.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().map_err(|_| lock_err("count"))?;
        let mut total = 0u64;
        if let Some(table) = state.tables.get(model) {
            for record in table.values() {
                if eval_domain(domain, record)? {
                    total += 1;
                }
            }
        }
        Ok(total)
    }

    fn exists(&self, model: &str, id: RecordId) -> Result<bool, TransportError> {
        self.calls.exists.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().map_err(|_| lock_err("exists"))?;
        Ok(state
            .tables
            .get(model)
            .is_some_and(|table| table.contains_key(&id)))
    }

    fn create(&self, model: &str, data: WireRecord) -> Result<RecordId, TransportError> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        trace!(model, "create");
        if let Ok(mut log) = self.create_log.lock() {
            log.push((model.to_string(), data.clone()));
        }

        let mut state = self.state.write().map_err(|_| lock_err("create"))?;
        let resolved = Self::apply_write(&mut state, model, data, None)?;
        let id = state.allocate_id(model);
        let mut record = resolved;
        record.insert("id".to_string(), id.as_i64().into());
        state
            .tables
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
        Ok(id)
    }

    fn update(&self, model: &str, id: RecordId, data: WireRecord) -> Result<(), TransportError> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        trace!(model, %id, "update");
        if let Ok(mut log) = self.update_log.lock() {
            log.push((model.to_string(), id, data.clone()));
        }

        let mut state = self.state.write().map_err(|_| lock_err("update"))?;
        let existing = state
            .tables
            .get(model)
            .and_then(|table| table.get(&id))
            .cloned()
            .ok_or_else(|| server_err(404, format!("record {id} of {model} not found")))?;
        let resolved = Self::apply_write(&mut state, model, data, Some(&existing))?;
        if let Some(record) = state
            .tables
            .get_mut(model)
            .and_then(|table| table.get_mut(&id))
        {
            for (key, value) in resolved {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    fn delete(&self, model: &str, id: RecordId) -> Result<(), TransportError> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        trace!(model, %id, "delete");
        let mut state = self.state.write().map_err(|_| lock_err("delete"))?;
        let removed = state
            .tables
            .get_mut(model)
            .and_then(|table| table.remove(&id));
        if removed.is_none() {
            return Err(server_err(404, format!("record {id} of {model} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(pairs: &[(&str, Value)]) -> WireRecord {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = MemoryTransport::new("t");
        let first = store.create("res.partner", WireRecord::new()).unwrap();
        let second = store.create("res.partner", WireRecord::new()).unwrap();
        assert_eq!(first, RecordId::new(1));
        assert_eq!(second, RecordId::new(2));
    }

    #[test]
    fn test_find_projects_requested_fields() {
        let store = MemoryTransport::new("t");
        store
            .seed_record(
                "res.partner",
                RecordId::new(1),
                record(&[("name", json!("Alice")), ("email", json!("a@x"))]),
            )
            .unwrap();

        let found = store
            .find(
                "res.partner",
                RecordId::new(1),
                &["name".to_string(), "active".to_string()],
            )
            .unwrap()
            .unwrap();

        assert_eq!(found.get("name"), Some(&json!("Alice")));
        // Requested but absent fields read back as the null sentinel.
        assert_eq!(found.get("active"), Some(&json!(false)));
        assert_eq!(found.get("id"), Some(&json!(1)));
        assert!(found.get("email").is_none());
    }

    #[test]
    fn test_find_missing_returns_none() {
        let store = MemoryTransport::new("t");
        assert!(store
            .find("res.partner", RecordId::new(9), &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_domain_eq_and_in() {
        let store = MemoryTransport::new("t");
        for (id, name, active) in [(1, "a", true), (2, "b", false), (3, "c", true)] {
            store
                .seed_record(
                    "m",
                    RecordId::new(id),
                    record(&[("name", json!(name)), ("active", json!(active))]),
                )
                .unwrap();
        }

        let active = store
            .find_by("m", Some(&Domain::eq("active", true)), &SearchOptions::default())
            .unwrap();
        assert_eq!(active.len(), 2);

        let ids = store
            .search("m", Some(&Domain::r#in("name", ["a", "c"])), &SearchOptions::default())
            .unwrap();
        assert_eq!(ids, vec![RecordId::new(1), RecordId::new(3)]);

        assert_eq!(store.count("m", Some(&Domain::eq("active", false))).unwrap(), 1);
    }

    #[test]
    fn test_order_limit_offset() {
        let store = MemoryTransport::new("t");
        for (id, name) in [(1, "c"), (2, "a"), (3, "b")] {
            store
                .seed_record("m", RecordId::new(id), record(&[("name", json!(name))]))
                .unwrap();
        }

        let mut options = SearchOptions::default();
        options.order = Some("name asc".to_string());
        options.limit = Some(2);
        options.offset = Some(1);
        let rows = store.find_by("m", None, &options).unwrap();
        let names: Vec<_> = rows
            .iter()
            .map(|row| row.get("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_update_merges_and_errors_on_missing() {
        let store = MemoryTransport::new("t");
        store
            .seed_record("m", RecordId::new(1), record(&[("name", json!("old"))]))
            .unwrap();

        store
            .update("m", RecordId::new(1), record(&[("name", json!("new"))]))
            .unwrap();
        let found = store.find("m", RecordId::new(1), &[]).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&json!("new")));

        let missing = store.update("m", RecordId::new(9), WireRecord::new());
        assert!(matches!(
            missing,
            Err(TransportError::ServerError { code: 404, .. })
        ));
    }

    #[test]
    fn test_link_commands_resolve_against_seeded_schema() {
        let store = MemoryTransport::new("t");
        store
            .seed_model(&ModelSeed::new("res.partner", "Contact").field(
                FieldSeed::new("tag_ids", "many2many").relation("res.tag", None),
            ))
            .unwrap();
        store.seed_model(&ModelSeed::new("res.tag", "Tag")).unwrap();
        store
            .seed_record("res.tag", RecordId::new(10), record(&[("name", json!("vip"))]))
            .unwrap();

        let id = store
            .create(
                "res.partner",
                record(&[(
                    "tag_ids",
                    json!([[4, 10, 0], [0, 0, {"name": "new-tag"}]]),
                )]),
            )
            .unwrap();

        let found = store.find("res.partner", id, &[]).unwrap().unwrap();
        let linked = found.get("tag_ids").unwrap().as_array().unwrap();
        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0], json!(10));

        // The create command materialized a real tag record.
        let created_id = linked[1].as_i64().unwrap();
        let tag = store
            .find("res.tag", RecordId::new(created_id), &[])
            .unwrap()
            .unwrap();
        assert_eq!(tag.get("name"), Some(&json!("new-tag")));

        // Unlink drops the id without deleting the record.
        store
            .update("res.partner", id, record(&[("tag_ids", json!([[3, 10, 0]]))]))
            .unwrap();
        let found = store.find("res.partner", id, &[]).unwrap().unwrap();
        assert_eq!(found.get("tag_ids").unwrap().as_array().unwrap().len(), 1);
        assert!(store.exists("res.tag", RecordId::new(10)).unwrap());
    }

    #[test]
    fn test_call_counters() {
        let store = MemoryTransport::new("t");
        store.seed_record("m", RecordId::new(1), WireRecord::new()).unwrap();
        store.find("m", RecordId::new(1), &[]).unwrap();
        store.exists("m", RecordId::new(1)).unwrap();
        store.count("m", None).unwrap();

        let stats = store.calls();
        assert_eq!(stats.finds, 1);
        assert_eq!(stats.exists, 1);
        assert_eq!(stats.counts, 1);
        assert_eq!(stats.creates, 0);
    }
}
