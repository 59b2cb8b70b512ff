use eavscope_core::{AttributeValue, Entity, EntityId, StoreId};
use eavscope_engine::{EngineConfig, EngineError, open_seller_repository};
use eavscope_harness::{TestStore, init_test_logging};

fn store(id: i64) -> StoreId {
    StoreId::new(id)
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn second_get_is_served_from_cache() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into())])?;

    let before = t.query_count();
    let first = t.repo.get(id, Some(store(2)))?;
    assert!(t.query_count() > before);

    let before = t.query_count();
    let second = t.repo.get(id, Some(store(2)))?;
    assert_eq!(t.query_count(), before);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn cache_entries_are_per_store() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme Default".into())])?;
    t.save_at(id, store(2), vec![("name", "Acme FR".into())])?;

    let fr = t.repo.get(id, Some(store(2)))?;
    let be = t.repo.get(id, Some(store(3)))?;
    let unscoped = t.repo.get(id, None)?;
    assert_eq!(t.repo.cached_entries(), 3);

    assert_eq!(fr.get_text("name"), Some("Acme FR"));
    assert_eq!(be.get_text("name"), Some("Acme Default"));
    assert_eq!(unscoped.store_id, None);
    assert_eq!(fr.store_id, Some(store(2)));
    Ok(())
}

#[test]
fn save_invalidates_every_store_key() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into())])?;
    for s in [None, Some(store(1)), Some(store(2)), Some(store(5))] {
        t.repo.get(id, s)?;
    }
    assert_eq!(t.repo.cached_entries(), 4);

    t.save_at(id, StoreId::DEFAULT, vec![("name", "Acme Renamed".into())])?;
    assert_eq!(t.repo.cached_entries(), 0);

    for s in [None, Some(store(1)), Some(store(2)), Some(store(5))] {
        assert_eq!(t.repo.get(id, s)?.get_text("name"), Some("Acme Renamed"), "{s:?}");
    }
    Ok(())
}

#[test]
fn save_leaves_other_entities_cached() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let acme = t.create_seller("acme", vec![])?;
    let globex = t.create_seller("globex", vec![])?;
    t.repo.get(acme, None)?;
    t.repo.get(globex, None)?;

    t.save_at(acme, store(2), vec![("name", "Acme FR".into())])?;
    assert_eq!(t.repo.cached_entries(), 1);

    let before = t.query_count();
    t.repo.get(globex, None)?;
    assert_eq!(t.query_count(), before);
    Ok(())
}

#[test]
fn bounded_cache_drops_least_recently_used_entry() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::with_config(EngineConfig {
        cache_capacity: 2,
        ..EngineConfig::default()
    })?;
    let id = t.create_seller("acme", vec![])?;
    t.repo.get(id, Some(store(1)))?;
    t.repo.get(id, Some(store(2)))?;
    t.repo.get(id, Some(store(1)))?;
    t.repo.get(id, Some(store(3)))?;
    assert_eq!(t.repo.cached_entries(), 2);

    let before = t.query_count();
    t.repo.get(id, Some(store(1)))?;
    assert_eq!(t.query_count(), before);
    t.repo.get(id, Some(store(2)))?;
    assert!(t.query_count() > before);
    Ok(())
}

// ============================================================================
// Lookup by id and code
// ============================================================================

#[test]
fn get_by_code_resolves_through_entity_table() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme Default".into())])?;
    t.save_at(id, store(2), vec![("name", "Acme FR".into())])?;

    let entity = t.repo.get_by_code("acme", Some(store(2)))?;
    assert_eq!(entity.id, Some(id));
    assert_eq!(entity.get_text("name"), Some("Acme FR"));
    Ok(())
}

#[test]
fn unknown_code_fails_before_any_value_query() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    t.create_seller("acme", vec![("name", "Acme".into())])?;

    let before = t.query_count();
    let result = t.repo.get_by_code("unknown-code", None);
    assert!(matches!(result, Err(EngineError::NotFound(_))));
    // Only the code lookup reached storage.
    assert_eq!(t.query_count() - before, 1);

    assert!(matches!(
        t.repo.get_by_code("  ", None),
        Err(EngineError::InvalidInput(_))
    ));
    Ok(())
}

#[test]
fn missing_and_malformed_ids() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    assert!(matches!(
        t.repo.get(EntityId::new(9999), None),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        t.repo.get(EntityId::new(0), Some(store(2))),
        Err(EngineError::InvalidInput(_))
    ));
    Ok(())
}

// ============================================================================
// Overrides
// ============================================================================

#[test]
fn override_set_is_loaded_once_per_entity_and_store() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller(
        "acme",
        vec![("name", "Acme Default".into()), ("description", "Tools".into())],
    )?;
    t.save_at(id, store(2), vec![("name", "Acme FR".into())])?;
    let entity = t.repo.get(id, Some(store(2)))?;

    let before = t.query_count();
    assert!(t.repo.contains_override(&entity, "name", store(2))?);
    assert_eq!(t.query_count() - before, 1);

    let before = t.query_count();
    assert!(!t.repo.contains_override(&entity, "description", store(2))?);
    assert!(!t.repo.contains_override(&entity, "is_active", store(2))?);
    assert_eq!(t.query_count(), before);

    // Store 0 never reaches storage.
    assert!(!t.repo.contains_override(&entity, "name", StoreId::DEFAULT)?);
    assert_eq!(t.query_count(), before);

    t.save_at(id, store(2), vec![("description", "Outils".into())])?;
    assert!(t.repo.contains_override(&entity, "description", store(2))?);
    Ok(())
}

#[test]
fn override_set_exposes_default_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme Default".into())])?;
    t.save_at(id, store(3), vec![("name", "Acme BE".into())])?;

    let overrides = t.repo.overrides(id, store(3))?;
    assert!(overrides.contains("name"));
    assert_eq!(overrides.default_value("name"), Some(&AttributeValue::from("Acme Default")));
    Ok(())
}

#[test]
fn override_queries_reject_bad_arguments() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![])?;
    let entity = t.repo.get(id, None)?;
    assert!(matches!(
        t.repo.contains_override(&entity, "colour", store(2)),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        t.repo.contains_override(&Entity::new("unsaved"), "name", store(2)),
        Err(EngineError::InvalidInput(_))
    ));
    Ok(())
}

// ============================================================================
// Save failures
// ============================================================================

#[test]
fn duplicate_code_could_not_save() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    t.create_seller("acme", vec![])?;
    let result = t.repo.save(Entity::new("acme"));
    assert!(matches!(result, Err(EngineError::CouldNotSave(_))));
    Ok(())
}

#[test]
fn rejected_input_keeps_its_type() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let cases = [
        Entity::new("acme").with_attribute("colour", "red"),
        Entity::new("acme").with_attribute("name", 7_i64),
        Entity::new("acme").with_attribute("name", "x".repeat(256)),
        Entity::new("x".repeat(65)),
        Entity::new(""),
    ];
    for entity in cases {
        let code = entity.code.clone();
        assert!(
            matches!(t.repo.save(entity), Err(EngineError::InvalidInput(_))),
            "{code}"
        );
    }
    // Nothing was written.
    let registry = t.repo.registry().clone();
    assert!(t.storage().load_collection(&registry, StoreId::DEFAULT, None, &[])?.is_empty());
    Ok(())
}

#[test]
fn saving_a_deleted_entity_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![])?;
    let entity = t.repo.get(id, None)?;
    t.repo.delete(&entity)?;
    assert!(matches!(t.repo.save(entity), Err(EngineError::NotFound(_))));
    Ok(())
}

#[test]
fn failed_save_rolls_back_value_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into())])?;
    t.create_seller("globex", vec![])?;

    // Renaming onto an existing code fails after the value rows are planned.
    let mut clash = t.repo.get(id, None)?;
    clash.code = "globex".into();
    clash.set("name", "Clash");
    assert!(matches!(t.repo.save(clash), Err(EngineError::CouldNotSave(_))));

    assert_eq!(t.repo.get(id, None)?.get_text("name"), Some("Acme"));
    Ok(())
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn delete_cascades_to_value_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into()), ("is_active", true.into())])?;
    t.save_at(id, store(2), vec![("name", "Acme FR".into())])?;
    t.repo.get(id, Some(store(2)))?;

    assert!(t.repo.delete_by_id(id)?);
    assert_eq!(t.repo.cached_entries(), 0);
    assert!(t.rows(id, "name")?.is_empty());
    assert!(t.rows(id, "is_active")?.is_empty());
    assert!(matches!(t.repo.get(id, Some(store(2))), Err(EngineError::NotFound(_))));
    assert!(matches!(t.repo.delete_by_id(id), Err(EngineError::NotFound(_))));
    Ok(())
}

#[test]
fn delete_blocked_by_downstream_reference() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into())])?;
    t.storage().conn().execute_batch(&format!(
        "CREATE TABLE seller_payout (
             payout_id INTEGER PRIMARY KEY,
             seller_id INTEGER NOT NULL REFERENCES seller_entity (entity_id)
         );
         INSERT INTO seller_payout (seller_id) VALUES ({});",
        id.get()
    ))?;
    let entity = t.repo.get(id, None)?;

    assert!(matches!(t.repo.delete(&entity), Err(EngineError::StateConflict(_))));
    assert_eq!(t.repo.cached_entries(), 1);
    assert_eq!(t.repo.get(id, None)?.get_text("name"), Some("Acme"));
    Ok(())
}

#[test]
fn delete_requires_an_identity() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    assert!(matches!(
        t.repo.delete(&Entity::new("never-saved")),
        Err(EngineError::InvalidInput(_))
    ));
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn file_backed_repository_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("engine.toml");
    std::fs::write(
        &config_path,
        format!(
            "cache_capacity = 16\ndatabase_path = \"{}\"\n",
            dir.path().join("sellers.db").display()
        ),
    )?;

    let id = {
        let mut repo = open_seller_repository(EngineConfig::load(&config_path)?)?;
        let saved = repo.save(Entity::new("acme").with_attribute("name", "Acme"))?;
        saved.require_id()?
    };

    let mut repo = open_seller_repository(EngineConfig::load(&config_path)?)?;
    let entity = repo.get_by_code("acme", None)?;
    assert_eq!(entity.id, Some(id));
    assert_eq!(entity.get_text("name"), Some("Acme"));
    Ok(())
}

// ============================================================================
// Partial edits
// ============================================================================

#[test]
fn editing_one_field_keeps_inherited_values_inherited() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller(
        "acme",
        vec![
            ("name", "Acme".into()),
            ("description", "Tools".into()),
            ("rating", AttributeValue::Decimal(3.0)),
        ],
    )?;

    let mut fr = t.repo.get(id, Some(store(2)))?;
    fr.set("name", "Acme FR");
    t.repo.save(fr)?;

    let fr = t.repo.get(id, Some(store(2)))?;
    assert!(t.repo.contains_override(&fr, "name", store(2))?);
    assert!(!t.repo.contains_override(&fr, "description", store(2))?);
    assert!(!t.repo.contains_override(&fr, "rating", store(2))?);
    assert_eq!(t.rows(id, "description")?.len(), 1);

    let mut admin = t.repo.get(id, None)?;
    admin.set("description", "Hardware");
    t.repo.save(admin)?;
    let fr = t.repo.get(id, Some(store(2)))?;
    assert_eq!(fr.get_text("description"), Some("Hardware"));
    assert_eq!(fr.get_text("name"), Some("Acme FR"));
    Ok(())
}

#[test]
fn saving_an_unchanged_entity_writes_no_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into()), ("is_active", true.into())])?;
    let entity = t.repo.get(id, Some(store(3)))?;

    let before = t.query_count();
    t.repo.save(entity)?;
    // Entity row update only.
    assert_eq!(t.query_count() - before, 1);
    assert_eq!(t.rows(id, "name")?.len(), 1);
    Ok(())
}

#[test]
fn clearing_a_value_at_the_default_store_drops_its_overrides() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestStore::new()?;
    let id = t.create_seller("acme", vec![("name", "Acme".into())])?;
    t.save_at(id, store(2), vec![("name", "Acme FR".into())])?;
    t.save_at(id, store(3), vec![("name", "Acme BE".into())])?;

    let mut admin = t.repo.get(id, None)?;
    admin.set("name", AttributeValue::Null);
    t.repo.save(admin)?;

    assert!(t.rows(id, "name")?.is_empty());
    let fr = t.repo.get(id, Some(store(2)))?;
    assert_eq!(fr.get("name"), None);
    assert!(!t.repo.contains_override(&fr, "name", store(2))?);
    Ok(())
}
