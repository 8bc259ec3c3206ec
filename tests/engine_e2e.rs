//! End-to-end engine tests against the in-memory store.
//!
//! The fixture seeds a small contact schema (partners with a to-one company
//! and a to-many tag set) plus a few records, then drives the public API:
//! fetch, lazy materialization, dirty diffing, link-command emission, delete
//! and the error taxonomy.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use remodel::{
    Collection, Domain, Engine, Entity, EntityDescriptor, FieldSeed, LogicError, MemoryTransport,
    ModelSeed, Obj, Order, OrmError, RecordId, RuntimeError, SchemaError, Transport,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Default)]
struct Company {
    id: Option<RecordId>,
    name: Option<String>,
}

impl Entity for Company {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::model::<Self>("res.company")
            .property("id", "id", |c| c.id.into(), |c, v| {
                c.id = v.try_into()?;
                Ok(())
            })
            .property("name", "name", |c| c.name.clone().into(), |c, v| {
                c.name = v.try_into()?;
                Ok(())
            })
            .build()
    }
}

#[derive(Debug, Default)]
struct Tag {
    id: Option<RecordId>,
    name: Option<String>,
}

impl Entity for Tag {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::model::<Self>("res.partner.tag")
            .property("id", "id", |t| t.id.into(), |t, v| {
                t.id = v.try_into()?;
                Ok(())
            })
            .property("name", "name", |t| t.name.clone().into(), |t, v| {
                t.name = v.try_into()?;
                Ok(())
            })
            .build()
    }
}

#[derive(Debug, Default)]
struct Partner {
    id: Option<RecordId>,
    name: Option<String>,
    email: Option<String>,
    active: Option<bool>,
    credit: Option<f64>,
    birthday: Option<NaiveDate>,
    last_seen: Option<chrono::DateTime<Utc>>,
    color: Option<String>,
    company: Option<Obj<Company>>,
    tags: Collection<Tag>,
}

impl Entity for Partner {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::model::<Self>("res.partner")
            .property("id", "id", |p| p.id.into(), |p, v| {
                p.id = v.try_into()?;
                Ok(())
            })
            .property("name", "name", |p| p.name.clone().into(), |p, v| {
                p.name = v.try_into()?;
                Ok(())
            })
            .property("email", "email", |p| p.email.clone().into(), |p, v| {
                p.email = v.try_into()?;
                Ok(())
            })
            .property("active", "active", |p| p.active.into(), |p, v| {
                p.active = v.try_into()?;
                Ok(())
            })
            .property("credit", "credit", |p| p.credit.into(), |p, v| {
                p.credit = v.try_into()?;
                Ok(())
            })
            .property("birthday", "birthday", |p| p.birthday.into(), |p, v| {
                p.birthday = v.try_into()?;
                Ok(())
            })
            .property("last_seen", "last_seen", |p| p.last_seen.into(), |p, v| {
                p.last_seen = v.try_into()?;
                Ok(())
            })
            .property("color", "color", |p| p.color.clone().into(), |p, v| {
                p.color = v.try_into()?;
                Ok(())
            })
            .property("company", "company_id", |p| p.company.into(), |p, v| {
                p.company = v.try_into()?;
                Ok(())
            })
            .property("tags", "tag_ids", |p| p.tags.clone().into(), |p, v| {
                p.tags = v.try_into()?;
                Ok(())
            })
            .build()
    }
}

fn record(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

fn fixture() -> (Arc<MemoryTransport>, Engine) {
    init_tracing();
    let store = Arc::new(MemoryTransport::new("e2e"));

    store
        .seed_model(&ModelSeed::new("res.company", "Company").field(FieldSeed::new("name", "char")))
        .unwrap();
    store
        .seed_model(&ModelSeed::new("res.partner.tag", "Partner Tag").field(
            FieldSeed::new("name", "char"),
        ))
        .unwrap();
    store
        .seed_model(
            &ModelSeed::new("res.partner", "Contact")
                .field(FieldSeed::new("name", "char").required().size(128))
                .field(FieldSeed::new("email", "char"))
                .field(FieldSeed::new("active", "boolean"))
                .field(FieldSeed::new("credit", "float"))
                .field(FieldSeed::new("birthday", "date"))
                .field(FieldSeed::new("last_seen", "datetime"))
                .field(
                    FieldSeed::new("color", "selection")
                        .inline_selection("[('red', 'Red'), ('blue', 'Blue')]"),
                )
                .field(FieldSeed::new("company_id", "many2one").relation("res.company", None))
                .field(FieldSeed::new("tag_ids", "many2many").relation("res.partner.tag", None)),
        )
        .unwrap();

    store
        .seed_record(
            "res.company",
            RecordId::new(1),
            record(&[("name", json!("Initech"))]),
        )
        .unwrap();
    for (id, name) in [(1, "vip"), (2, "beta"), (3, "gold")] {
        store
            .seed_record(
                "res.partner.tag",
                RecordId::new(id),
                record(&[("name", json!(name))]),
            )
            .unwrap();
    }
    store
        .seed_record(
            "res.partner",
            RecordId::new(1),
            record(&[
                ("name", json!("Alice")),
                ("email", json!("alice@example.com")),
                ("active", json!(true)),
                ("credit", json!(12.5)),
                ("birthday", json!("2020-01-02")),
                ("last_seen", json!("2021-05-06 07:08:09")),
                ("color", json!("red")),
                ("company_id", json!([1, "Initech"])),
                ("tag_ids", json!([1, 2, 3])),
            ]),
        )
        .unwrap();
    store
        .seed_record(
            "res.partner",
            RecordId::new(2),
            record(&[("name", json!("Zoe"))]),
        )
        .unwrap();

    let engine = Engine::new(store.clone());
    engine.register::<Company>().unwrap();
    engine.register::<Tag>().unwrap();
    engine.register::<Partner>().unwrap();
    (store, engine)
}

fn tag_with_id(engine: &Engine, tags: &Collection<Tag>, id: i64) -> Obj<Tag> {
    tags.iter()
        .find(|tag| engine.id_of(*tag).unwrap() == Some(RecordId::new(id)))
        .expect("tag member not found")
}

#[test]
fn denormalizes_scalars_dates_and_associations() {
    let (_store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    engine
        .read(partner, |p| {
            assert_eq!(p.name.as_deref(), Some("Alice"));
            assert_eq!(p.email.as_deref(), Some("alice@example.com"));
            assert_eq!(p.active, Some(true));
            assert_eq!(p.credit, Some(12.5));
            assert_eq!(p.birthday, NaiveDate::from_ymd_opt(2020, 1, 2));
            assert_eq!(
                p.last_seen,
                Utc.with_ymd_and_hms(2021, 5, 6, 7, 8, 9).single()
            );
            assert_eq!(p.color.as_deref(), Some("red"));
            assert!(p.company.is_some());
            assert_eq!(p.tags.len(), 3);
            assert_eq!(
                p.tags.stored_ids(),
                &[RecordId::new(1), RecordId::new(2), RecordId::new(3)]
            );
        })
        .unwrap();

    // Missing scalars come back as None, not as the false sentinel.
    let zoe = engine.get::<Partner>(RecordId::new(2)).unwrap();
    engine
        .read(zoe, |p| {
            assert_eq!(p.name.as_deref(), Some("Zoe"));
            assert_eq!(p.email, None);
            assert_eq!(p.company, None);
            assert!(p.tags.is_empty());
        })
        .unwrap();
}

#[test]
fn get_errors_and_find_returns_none_for_missing_records() {
    let (_store, engine) = fixture();

    let err = engine.get::<Partner>(RecordId::new(404)).unwrap_err();
    assert!(matches!(
        err,
        OrmError::RecordNotFound { ref model, id } if model == "res.partner" && id == RecordId::new(404)
    ));

    assert!(engine.find::<Partner>(RecordId::new(404)).unwrap().is_none());
}

#[test]
fn identity_map_yields_one_instance_per_record() {
    let (store, engine) = fixture();

    let first = engine.get::<Partner>(RecordId::new(1)).unwrap();
    let second = engine.get::<Partner>(RecordId::new(1)).unwrap();
    let third = engine.find::<Partner>(RecordId::new(1)).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(first, third);
    // Identity mapping does not skip the fetches themselves.
    assert_eq!(store.calls().finds, 3);

    assert!(engine.cached_record("res.partner", RecordId::new(1)).is_some());
}

#[test]
fn lazy_proxy_materializes_once_and_id_access_is_free() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    let company = engine.read(partner, |p| p.company).unwrap().unwrap();
    let finds_before = store.calls().finds;

    // Reading the identifier never touches the store.
    assert_eq!(engine.id_of(company).unwrap(), Some(RecordId::new(1)));
    assert_eq!(store.calls().finds, finds_before);

    // First real access triggers exactly one fetch.
    let name = engine.read(company, |c| c.name.clone()).unwrap();
    assert_eq!(name.as_deref(), Some("Initech"));
    assert_eq!(store.calls().finds, finds_before + 1);

    // Subsequent accesses pass through.
    engine.read(company, |c| assert!(c.name.is_some())).unwrap();
    assert_eq!(store.calls().finds, finds_before + 1);
}

#[test]
fn persist_emits_only_changed_fields() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    engine
        .write(partner, |p| p.email = Some("alice@new.example".to_string()))
        .unwrap();
    engine.persist(partner).unwrap();

    let updates = store.update_log();
    assert_eq!(updates.len(), 1);
    let (model, id, data) = &updates[0];
    assert_eq!(model, "res.partner");
    assert_eq!(*id, RecordId::new(1));
    assert_eq!(
        Value::Object(data.clone()),
        json!({"email": "alice@new.example"})
    );
}

#[test]
fn persist_formats_dates_for_the_wire() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    engine
        .write(partner, |p| {
            p.birthday = NaiveDate::from_ymd_opt(2023, 11, 30);
            p.last_seen = Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).single();
        })
        .unwrap();
    engine.persist(partner).unwrap();

    let (_, _, data) = store.update_log().pop().unwrap();
    assert_eq!(
        Value::Object(data),
        json!({"birthday": "2023-11-30", "last_seen": "2022-03-04 05:06:07"})
    );
}

#[test]
fn persist_twice_is_idempotent() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();

    // Nothing changed at all: no update.
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 0);

    engine
        .write(partner, |p| p.credit = Some(99.0))
        .unwrap();
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 1);

    // The post-save refresh re-snapshots, so saving again sends nothing.
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 1);
}

#[test]
fn persist_of_unchanged_denormalized_value_roundtrips() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    // Re-assign a field to the exact stored value: normalize(denormalize(x))
    // must equal the snapshot, so no update goes out.
    engine
        .write(partner, |p| p.email = Some("alice@example.com".to_string()))
        .unwrap();
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 0);
}

#[test]
fn create_assigns_id_and_refreshes() {
    let (store, engine) = fixture();

    let partner = engine
        .attach(Partner {
            name: Some("Bob".to_string()),
            active: Some(true),
            ..Partner::default()
        })
        .unwrap();
    assert_eq!(engine.id_of(partner).unwrap(), None);

    engine.persist(partner).unwrap();

    let id = engine.id_of(partner).unwrap().expect("id assigned");
    let creates = store.create_log();
    assert_eq!(creates.len(), 1);
    let (model, data) = &creates[0];
    assert_eq!(model, "res.partner");
    assert_eq!(data.get("name"), Some(&json!("Bob")));
    assert_eq!(data.get("active"), Some(&json!(true)));
    // Null scalars are sent as the store's false sentinel.
    assert_eq!(data.get("email"), Some(&json!(false)));
    // An untouched to-many field is omitted entirely.
    assert!(data.get("tag_ids").is_none());
    assert!(data.get("id").is_none());

    // The post-create refresh pulled the record back.
    assert!(store.exists("res.partner", id).unwrap());
    engine
        .read(partner, |p| assert_eq!(p.name.as_deref(), Some("Bob")))
        .unwrap();
}

#[test]
fn create_with_empty_payload_is_a_noop() {
    init_tracing();
    let store = Arc::new(MemoryTransport::new("stub"));
    store.seed_model(&ModelSeed::new("res.stub", "Stub")).unwrap();

    #[derive(Debug, Default)]
    struct Stub {
        id: Option<RecordId>,
    }
    impl Entity for Stub {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::model::<Self>("res.stub")
                .property("id", "id", |s| s.id.into(), |s, v| {
                    s.id = v.try_into()?;
                    Ok(())
                })
                .build()
        }
    }

    let engine = Engine::new(store.clone());
    let stub = engine.attach(Stub::default()).unwrap();
    engine.persist(stub).unwrap();

    assert_eq!(store.calls().creates, 0);
    assert_eq!(engine.id_of(stub).unwrap(), None);
}

#[test]
fn collection_diff_emits_link_create_and_unlink_commands() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    let mut tags = engine.read(partner, |p| p.tags.clone()).unwrap();

    // Drop member 1, keep 2 and 3 (materialized, unchanged), add a new one.
    let first = tag_with_id(&engine, &tags, 1);
    tags.remove(first);
    for id in [2, 3] {
        let member = tag_with_id(&engine, &tags, id);
        engine.read(member, |_| ()).unwrap();
    }
    let fresh = engine
        .attach(Tag {
            name: Some("fresh".to_string()),
            ..Tag::default()
        })
        .unwrap();
    tags.push(fresh);

    engine.write(partner, |p| p.tags = tags).unwrap();
    engine.persist(partner).unwrap();

    let (_, _, data) = store.update_log().pop().unwrap();
    let commands = data.get("tag_ids").unwrap().as_array().unwrap();
    assert!(commands.contains(&json!([4, 2, 0])), "link-existing(2): {commands:?}");
    assert!(commands.contains(&json!([4, 3, 0])), "link-existing(3): {commands:?}");
    assert!(commands.contains(&json!([3, 1, 0])), "unlink(1): {commands:?}");
    assert!(
        commands.contains(&json!([0, 0, {"name": "fresh"}])),
        "create-new: {commands:?}"
    );
    assert_eq!(commands.len(), 4);

    // The store applied the commands: 1 unlinked, new tag created and linked.
    let record = store
        .find("res.partner", RecordId::new(1), &[])
        .unwrap()
        .unwrap();
    let linked = record.get("tag_ids").unwrap().as_array().unwrap();
    assert_eq!(linked.len(), 3);
    assert!(!linked.contains(&json!(1)));

    // After the refresh the collection is clean again.
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 1);
}

#[test]
fn changed_collection_member_becomes_an_update_command() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    let tags = engine.read(partner, |p| p.tags.clone()).unwrap();
    let member = tag_with_id(&engine, &tags, 2);

    engine
        .write(member, |t| t.name = Some("beta+".to_string()))
        .unwrap();
    engine.persist(partner).unwrap();

    let (_, _, data) = store.update_log().pop().unwrap();
    let commands = data.get("tag_ids").unwrap().as_array().unwrap();
    // Members 1 and 3 are untouched proxies: linked, silent. Member 2 is
    // materialized and dirty: an update command carrying only its diff.
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0], json!([1, 2, {"name": "beta+"}]));

    let tag = store
        .find("res.partner.tag", RecordId::new(2), &[])
        .unwrap()
        .unwrap();
    assert_eq!(tag.get("name"), Some(&json!("beta+")));
}

#[test]
fn pushing_a_reference_into_a_collection_links_it() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(2)).unwrap();
    let tag = engine.reference::<Tag>(RecordId::new(3)).unwrap();
    engine.write(partner, |p| p.tags.push(tag)).unwrap();
    engine.persist(partner).unwrap();

    let (_, _, data) = store.update_log().pop().unwrap();
    assert_eq!(data.get("tag_ids"), Some(&json!([[4, 3, 0]])));
    // One find for the partner, one for the post-update refresh; the tag
    // itself was never fetched.
    assert_eq!(store.calls().finds, 2);

    // Once the link is stored, saving again sends nothing.
    engine.persist(partner).unwrap();
    assert_eq!(store.calls().updates, 1);
}

#[test]
fn unpersisted_to_one_association_fails_to_normalize() {
    let (_store, engine) = fixture();

    let company = engine
        .attach(Company {
            name: Some("Acme".to_string()),
            ..Company::default()
        })
        .unwrap();
    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    engine.write(partner, |p| p.company = Some(company)).unwrap();

    let err = engine.persist(partner).unwrap_err();
    assert!(matches!(
        err,
        OrmError::Runtime(RuntimeError::UnpersistedAssociation { ref property, .. })
            if property.contains("company")
    ));
}

#[test]
fn reference_handles_need_no_fetch_to_be_assigned() {
    let (store, engine) = fixture();

    let company = engine.reference::<Company>(RecordId::new(1)).unwrap();
    let partner = engine
        .attach(Partner {
            name: Some("Carol".to_string()),
            company: Some(company),
            ..Partner::default()
        })
        .unwrap();
    engine.persist(partner).unwrap();

    let (_, data) = store.create_log().pop().unwrap();
    assert_eq!(data.get("company_id"), Some(&json!(1)));
    // One find for the post-create refresh; the company itself was never read.
    assert_eq!(store.calls().finds, 1);
}

#[test]
fn proxy_for_a_vanished_record_fails_with_record_not_found() {
    let (store, engine) = fixture();

    let ghost = engine.reference::<Company>(RecordId::new(999)).unwrap();
    let err = engine.read(ghost, |c| c.name.clone()).unwrap_err();
    assert!(err.is_record_not_found());

    // The proxy stays retryable: the next access hits the store again.
    let err = engine.read(ghost, |c| c.name.clone()).unwrap_err();
    assert!(err.is_record_not_found());
    assert_eq!(store.calls().finds, 2);
}

#[test]
fn delete_clears_identifier_and_requires_persistence() {
    let (store, engine) = fixture();

    let partner = engine.get::<Partner>(RecordId::new(1)).unwrap();
    engine.delete(partner).unwrap();

    assert_eq!(engine.id_of(partner).unwrap(), None);
    assert!(!store.exists("res.partner", RecordId::new(1)).unwrap());
    assert!(engine.cached_record("res.partner", RecordId::new(1)).is_none());

    // Refresh and delete on a non-persisted object are logic errors.
    let err = engine.refresh(partner).unwrap_err();
    assert!(matches!(err, OrmError::Logic(LogicError::NotPersisted { .. })));
    let err = engine.delete(partner).unwrap_err();
    assert!(matches!(err, OrmError::Logic(LogicError::NotPersisted { .. })));
}

#[test]
fn refresh_before_create_is_a_logic_error() {
    let (_store, engine) = fixture();

    let partner = engine.attach(Partner::default()).unwrap();
    let err = engine.refresh(partner).unwrap_err();
    assert!(matches!(err, OrmError::Logic(LogicError::NotPersisted { .. })));
}

#[test]
fn repository_queries_filter_sort_and_paginate() {
    let (_store, engine) = fixture();
    let repository = engine.repository::<Partner>().unwrap();

    let all = repository.find_all(&[("name", Order::Desc)], None, None).unwrap();
    assert_eq!(all.len(), 2);
    let first_name = engine.read(all[0], |p| p.name.clone()).unwrap();
    assert_eq!(first_name.as_deref(), Some("Zoe"));

    let alice = repository
        .find_one_by(Some(&Domain::eq("name", "Alice")), &[])
        .unwrap()
        .expect("alice exists");
    assert_eq!(engine.id_of(alice).unwrap(), Some(RecordId::new(1)));

    let none = repository
        .find_one_by(Some(&Domain::eq("name", "Nobody")), &[])
        .unwrap();
    assert!(none.is_none());

    let page = repository.find_all(&[("name", Order::Asc)], Some(1), Some(1)).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(
        engine.read(page[0], |p| p.name.clone()).unwrap().as_deref(),
        Some("Zoe")
    );
}

#[test]
fn search_count_exists_read_no_records() {
    let (store, engine) = fixture();
    let repository = engine.repository::<Partner>().unwrap();
    let finds_before = store.calls().finds;

    let ids = repository
        .search(Some(&Domain::eq("name", "Alice")), &[], None, None)
        .unwrap();
    assert_eq!(ids, vec![RecordId::new(1)]);

    assert_eq!(
        repository.search_one(Some(&Domain::eq("name", "Zoe")), &[]).unwrap(),
        Some(RecordId::new(2))
    );
    assert_eq!(repository.search_all(&[], None, None).unwrap().len(), 2);
    assert_eq!(repository.count(None).unwrap(), 2);
    assert!(repository.exists(RecordId::new(1)).unwrap());
    assert!(!repository.exists(RecordId::new(404)).unwrap());

    assert_eq!(store.calls().finds, finds_before);
}

#[test]
fn schema_discovers_selections_from_both_sources() {
    init_tracing();
    let store = Arc::new(MemoryTransport::new("schema"));
    store
        .seed_model(
            &ModelSeed::new("res.company", "Company").field(
                FieldSeed::new("state", "selection").choices(&[("draft", "Draft"), ("open", "Open")]),
            ),
        )
        .unwrap();

    let engine = Engine::new(store.clone());
    let model = engine.schema().model("res.company").unwrap();

    // One model read, one field read, one choice read.
    assert_eq!(store.calls().searches, 3);

    let state = model.field("state").unwrap();
    let selection = state.selection.as_ref().unwrap();
    assert_eq!(selection.values(), vec!["draft", "open"]);
    assert_eq!(selection.choice("open").unwrap().name, "Open");

    // Repeated lookups are served from the cache.
    let again = engine.schema().model("res.company").unwrap();
    assert_eq!(again.field_names(), model.field_names());
    assert_eq!(store.calls().searches, 3);

    // The inline spec variant, via the full fixture.
    let (_, engine) = fixture();
    let partner_model = engine.schema().model("res.partner").unwrap();
    let color = partner_model.field("color").unwrap();
    assert_eq!(
        color.selection.as_ref().unwrap().values(),
        vec!["red", "blue"]
    );
}

#[test]
fn unknown_model_errors_and_is_not_cached() {
    init_tracing();
    let store = Arc::new(MemoryTransport::new("unknown"));
    let engine = Engine::new(store.clone());

    #[derive(Debug, Default)]
    struct Ghost;
    impl Entity for Ghost {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::model::<Self>("res.ghost").build()
        }
    }

    let err = engine.register::<Ghost>().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Schema(SchemaError::ModelNotFound { ref model }) if model == "res.ghost"
    ));
    let searches_after_first = store.calls().searches;

    // Failures are not cached: the next attempt asks the store again.
    let err = engine.register::<Ghost>().unwrap_err();
    assert!(err.is_schema());
    assert!(store.calls().searches > searches_after_first);
}
