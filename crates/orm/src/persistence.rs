//! Inheritance persistence protocol
//!
//! Routes reads and writes of models that split their attributes between a
//! parent table and their own table. A child-role record carries the parent
//! row's key as its parent link; its primary key is its own table's key.
//! Multi-table writes run in one transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::backends::{Connection, Filter};
use crate::error::{OrmError, OrmResult};
use crate::model::{ModelCatalog, ModelDescriptor, Record};
use crate::naming::{self, CREATED_AT, DELETED_AT, DISCRIMINATOR, PRIMARY_KEY, UPDATED_AT};
use crate::resolver::ColumnOrigin;
use crate::transaction::transaction;
use crate::value::{Attributes, Value};

/// Build a record of `model` from one row of its table
///
/// Child-role rows are merged over their parent rows. Polymorphic rows
/// whose discriminator names a direct table child are re-hydrated as that
/// child.
pub fn hydrate(catalog: &ModelCatalog, conn: &mut dyn Connection, model: &str, row: Attributes) -> OrmResult<Record> {
    let descriptor = catalog.descriptor(model)?;
    let mut record = Record::new(Arc::clone(&descriptor));

    if descriptor.is_child() {
        let (attributes, link) = merge_with_parent(catalog, conn, &descriptor, row)?;
        record.attributes = attributes;
        record.parent_link = Some(link);
    } else {
        record.attributes = row;
    }

    if let Some((promoted, _)) = promote(catalog, conn, &record)? {
        record = promoted;
    }

    record.exists = true;
    record.sync_original();
    Ok(record)
}

/// Records matching `filter`, without eager loading
///
/// Soft-deleted rows are excluded when the model has a `deleted_at` column.
pub fn select(catalog: &ModelCatalog, conn: &mut dyn Connection, model: &str, filter: &Filter) -> OrmResult<Vec<Record>> {
    let descriptor = catalog.descriptor(model)?;
    let mut filter = filter.clone();
    if descriptor.soft_deletes() {
        filter = filter.eq(DELETED_AT, Value::Null);
    }

    let rows = conn.select(&descriptor.table, &filter)?;
    rows.into_iter()
        .map(|row| hydrate(catalog, conn, model, row))
        .collect()
}

/// Records matching `filter`, with the descriptor's `with` relations loaded
pub fn get(catalog: &ModelCatalog, conn: &mut dyn Connection, model: &str, filter: Filter) -> OrmResult<Vec<Record>> {
    let mut records = select(catalog, conn, model, &filter)?;
    for record in &mut records {
        let descriptor = Arc::clone(record.descriptor());
        for name in &descriptor.with {
            record.load(catalog, conn, name)?;
        }
    }
    Ok(records)
}

/// Record by primary key
pub fn find(
    catalog: &ModelCatalog,
    conn: &mut dyn Connection,
    model: &str,
    id: impl Into<Value>,
) -> OrmResult<Option<Record>> {
    Ok(get(catalog, conn, model, Filter::new().eq(PRIMARY_KEY, id))?
        .into_iter()
        .next())
}

/// Insert a new record of `model` from mass-assigned attributes
///
/// Keys naming a model-typed property or a registered model map to the
/// foreign key, non-fillable keys are discarded and declared defaults fill
/// missing columns. A child model inserts its parent rows first.
pub fn create(catalog: &ModelCatalog, conn: &mut dyn Connection, model: &str, attributes: Attributes) -> OrmResult<Record> {
    let descriptor = catalog.descriptor(model)?;
    let levels = table_chain(catalog, model)?;

    let mut prepared = Attributes::new();
    for (key, value) in attributes {
        let key = foreign_key_alias(catalog, &levels, key);
        if descriptor.is_fillable(&key) {
            prepared.insert(key, value);
        } else {
            debug!("Discarding non-fillable attribute '{}' on {}", key, model);
        }
    }
    for level in &levels {
        for column in level.columns.iter() {
            if let Some(default) = &column.descriptor.default {
                prepared
                    .entry(column.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    let (attributes, link) = insert_chain(conn, &levels, &prepared)?;
    let mut record = Record::new(descriptor);
    record.attributes = attributes;
    record.parent_link = link;
    record.exists = true;
    record.sync_original();
    Ok(record)
}

/// Persist a record: insert when new, otherwise write its dirty attributes
pub fn save(catalog: &ModelCatalog, conn: &mut dyn Connection, record: &mut Record) -> OrmResult<()> {
    let descriptor = Arc::clone(record.descriptor());

    if !record.exists {
        let levels = table_chain(catalog, &descriptor.name)?;
        let (attributes, link) = insert_chain(conn, &levels, &record.attributes)?;
        record.attributes = attributes;
        record.parent_link = link;
    } else if descriptor.is_child() {
        save_child(catalog, conn, &descriptor, record)?;
    } else {
        save_plain(conn, &descriptor, record)?;
    }

    record.exists = true;
    record.sync_original();
    Ok(())
}

/// Delete a persisted record
///
/// A polymorphic record whose discriminator names a direct table child with
/// an existing child row is deleted through that child. Child-role records
/// delete their own row and their parent row together; plain records are
/// soft-deleted when the model has `deleted_at`.
pub fn delete(catalog: &ModelCatalog, conn: &mut dyn Connection, record: &mut Record) -> OrmResult<()> {
    if !record.exists {
        debug!("Skipping delete of unsaved {}", record.model());
        return Ok(());
    }

    if let Some((mut child, true)) = promote(catalog, conn, record)? {
        debug!("Delegating delete of {} to {}", record.model(), child.model());
        child.exists = true;
        delete(catalog, conn, &mut child)?;
        record.exists = false;
        return Ok(());
    }

    let descriptor = Arc::clone(record.descriptor());
    if descriptor.is_child() {
        let link = record
            .parent_link
            .clone()
            .filter(|value| !value.is_null())
            .ok_or_else(|| OrmError::MissingPrimaryKey(descriptor.name.clone()))?;
        let parent = parent_descriptor(catalog, &descriptor)?;
        delete_pair(conn, &descriptor, &parent.table, link)?;
    } else {
        let id = record
            .key()
            .cloned()
            .ok_or_else(|| OrmError::MissingPrimaryKey(descriptor.name.clone()))?;
        let filter = Filter::new().eq(PRIMARY_KEY, id);
        if descriptor.soft_deletes() {
            let now = Value::Timestamp(Utc::now());
            let mut changes = Attributes::new();
            changes.insert(DELETED_AT.to_string(), now.clone());
            conn.update(&descriptor.table, &filter, &changes)?;
            record.attributes.insert(DELETED_AT.to_string(), now);
            record.sync_original();
        } else {
            conn.delete(&descriptor.table, &filter)?;
        }
    }

    record.exists = false;
    Ok(())
}

fn parent_descriptor(catalog: &ModelCatalog, descriptor: &ModelDescriptor) -> OrmResult<Arc<ModelDescriptor>> {
    let parent = descriptor
        .parent
        .as_deref()
        .ok_or_else(|| OrmError::metadata(&descriptor.name, "model has no parent table"))?;
    catalog.descriptor(parent)
}

/// Child row attributes merged over its parent's, and the parent link
fn merge_with_parent(
    catalog: &ModelCatalog,
    conn: &mut dyn Connection,
    descriptor: &ModelDescriptor,
    mut row: Attributes,
) -> OrmResult<(Attributes, Value)> {
    let parent = parent_descriptor(catalog, descriptor)?;
    let link_column = naming::foreign_key(&parent.name);
    let missing = |key: String| OrmError::MissingParentRow {
        model: descriptor.name.clone(),
        table: parent.table.clone(),
        key,
    };

    let link = row
        .shift_remove(&link_column)
        .filter(|value| !value.is_null())
        .ok_or_else(|| missing("null".to_string()))?;
    let parent_row = conn
        .first(&parent.table, &Filter::new().eq(PRIMARY_KEY, link.clone()))?
        .ok_or_else(|| missing(link.to_string()))?;

    let mut attributes = if parent.is_child() {
        merge_with_parent(catalog, conn, &parent, parent_row)?.0
    } else {
        parent_row
    };
    for (name, value) in row {
        attributes.insert(name, value);
    }
    Ok((attributes, link))
}

/// Re-instantiate a polymorphic record as the direct table child its tag names
///
/// The flag reports whether the child's own row was found; without it the
/// promoted record keeps the parent attributes only.
fn promote(catalog: &ModelCatalog, conn: &mut dyn Connection, record: &Record) -> OrmResult<Option<(Record, bool)>> {
    let descriptor = record.descriptor();
    if !descriptor.is_polymorphic() {
        return Ok(None);
    }
    let Some(tag) = record.get(DISCRIMINATOR).and_then(Value::as_str) else {
        return Ok(None);
    };
    let Some(child_name) = descriptor.resolve_tag(tag).filter(|name| *name != descriptor.name) else {
        return Ok(None);
    };
    let child = catalog.descriptor(child_name)?;
    if child.parent.as_deref() != Some(descriptor.name.as_str()) {
        debug!("Tag '{}' on {} is not a direct table child, keeping declared type", tag, descriptor.name);
        return Ok(None);
    }
    let Some(id) = record.key().cloned() else {
        return Ok(None);
    };

    let link_column = naming::foreign_key(&descriptor.name);
    let child_row = conn.first(&child.table, &Filter::new().eq(link_column.clone(), id.clone()))?;
    let found = child_row.is_some();

    let mut attributes = record.attributes.clone();
    match child_row {
        Some(mut row) => {
            row.shift_remove(&link_column);
            for (name, value) in row {
                attributes.insert(name, value);
            }
        }
        None => debug!("No '{}' row for {} {}, keeping parent attributes", child.table, descriptor.name, id),
    }

    let mut promoted = Record::new(child);
    promoted.attributes = attributes;
    promoted.parent_link = Some(id);
    Ok(Some((promoted, found)))
}

/// Descriptors along the table-parent chain, root first
fn table_chain(catalog: &ModelCatalog, model: &str) -> OrmResult<Vec<Arc<ModelDescriptor>>> {
    let mut levels = vec![catalog.descriptor(model)?];
    while let Some(parent) = levels.last().and_then(|level| level.parent.clone()) {
        if levels.iter().any(|level| level.name == parent) {
            return Err(OrmError::metadata(model, "table parent chain is cyclic"));
        }
        levels.push(catalog.descriptor(&parent)?);
    }
    levels.reverse();
    Ok(levels)
}

fn foreign_key_alias(catalog: &ModelCatalog, levels: &[Arc<ModelDescriptor>], key: String) -> String {
    let column = levels.iter().rev().find_map(|level| {
        level
            .columns
            .iter()
            .find(|column| column.related.is_some() && column.property.as_deref() == Some(key.as_str()))
            .map(|column| column.name.clone())
    });
    match column {
        Some(column) => column,
        None if catalog.registry().contains(&key) => naming::foreign_key(&key),
        None => key,
    }
}

/// Insert one row per level, linking each to the previous level's row
///
/// Returns the merged attributes (later levels win) and the parent link of
/// the last level.
fn insert_chain(
    conn: &mut dyn Connection,
    levels: &[Arc<ModelDescriptor>],
    attributes: &Attributes,
) -> OrmResult<(Attributes, Option<Value>)> {
    transaction(conn, |conn| {
        let now = Value::Timestamp(Utc::now());
        let mut merged = Attributes::new();
        let mut previous: Option<Value> = None;
        let mut parent_link = None;

        for (index, level) in levels.iter().enumerate() {
            let mut row: Attributes = attributes
                .iter()
                .filter(|(name, _)| {
                    name.as_str() != PRIMARY_KEY
                        && level
                            .columns
                            .get(name)
                            .map(|column| !column.origin.is_synthesized())
                            .unwrap_or(false)
                })
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();

            for column in [CREATED_AT, UPDATED_AT] {
                if level.has_column(column) && row.get(column).map_or(true, Value::is_null) {
                    row.insert(column.to_string(), now.clone());
                }
            }
            // A declared `type` is caller data unless a child level needs the tag
            let synthesized_tag = level
                .columns
                .get(DISCRIMINATOR)
                .map_or(false, |column| column.origin == ColumnOrigin::Discriminator);
            match levels.get(index + 1) {
                Some(child) if level.has_column(DISCRIMINATOR) => {
                    row.insert(DISCRIMINATOR.to_string(), Value::from(child.name.as_str()));
                }
                None if synthesized_tag => {
                    row.insert(DISCRIMINATOR.to_string(), Value::from(level.name.as_str()));
                }
                _ => {}
            }

            let link = previous.take();
            let link_column = level.parent_link_column();
            if let (Some(column), Some(value)) = (&link_column, &link) {
                row.insert(column.clone(), value.clone());
            }

            let id = conn.insert_get_id(&level.table, &row)?;
            debug!("Inserted {} row {} into '{}'", level.name, id, level.table);

            if let Some(column) = &link_column {
                row.shift_remove(column);
            }
            merged.extend(row);
            merged.insert(PRIMARY_KEY.to_string(), Value::Integer(id));
            previous = Some(Value::Integer(id));
            parent_link = link;
        }

        Ok((merged, parent_link))
    })
}

fn save_plain(conn: &mut dyn Connection, descriptor: &ModelDescriptor, record: &mut Record) -> OrmResult<()> {
    let id = record
        .key()
        .cloned()
        .ok_or_else(|| OrmError::MissingPrimaryKey(descriptor.name.clone()))?;

    let mut changes: Attributes = record
        .dirty()
        .into_iter()
        .filter(|(name, _)| name != PRIMARY_KEY && descriptor.has_column(name))
        .collect();
    if changes.is_empty() {
        debug!("No changes to save for {} {}", descriptor.name, id);
        return Ok(());
    }

    if descriptor.has_column(UPDATED_AT) && !changes.contains_key(UPDATED_AT) {
        let now = Value::Timestamp(Utc::now());
        changes.insert(UPDATED_AT.to_string(), now.clone());
        record.attributes.insert(UPDATED_AT.to_string(), now);
    }

    conn.update(&descriptor.table, &Filter::new().eq(PRIMARY_KEY, id), &changes)?;
    Ok(())
}

/// Split dirty attributes between the parent table and the own table
fn save_child(
    catalog: &ModelCatalog,
    conn: &mut dyn Connection,
    descriptor: &ModelDescriptor,
    record: &mut Record,
) -> OrmResult<()> {
    let link = record
        .parent_link
        .clone()
        .filter(|value| !value.is_null())
        .ok_or_else(|| OrmError::MissingPrimaryKey(descriptor.name.clone()))?;
    let parent = parent_descriptor(catalog, descriptor)?;
    let link_column = naming::foreign_key(&parent.name);

    let mut parent_changes = Attributes::new();
    let mut own_changes = Attributes::new();
    for (name, value) in record.dirty() {
        if name == PRIMARY_KEY {
            continue;
        }
        if descriptor.parent_columns.contains(&name) {
            parent_changes.insert(name, value);
        } else if descriptor.has_column(&name) {
            own_changes.insert(name, value);
        } else {
            debug!("Attribute '{}' has no column on {}, not saved", name, descriptor.name);
        }
    }

    if parent_changes.is_empty() && own_changes.is_empty() {
        return Ok(());
    }

    let inserted = transaction(conn, |conn| {
        let mut inserted = None;
        if !own_changes.is_empty() {
            let filter = Filter::new().eq(link_column.clone(), link.clone());
            if conn.exists(&descriptor.table, &filter)? {
                conn.update(&descriptor.table, &filter, &own_changes)?;
            } else {
                let now = Value::Timestamp(Utc::now());
                let mut row = own_changes;
                row.insert(link_column.clone(), link.clone());
                for column in [CREATED_AT, UPDATED_AT] {
                    if descriptor.has_column(column) && !row.contains_key(column) {
                        row.insert(column.to_string(), now.clone());
                    }
                }
                inserted = Some(conn.insert_get_id(&descriptor.table, &row)?);
            }
        }
        if !parent_changes.is_empty() {
            conn.update(&parent.table, &Filter::new().eq(PRIMARY_KEY, link.clone()), &parent_changes)?;
        }
        Ok(inserted)
    })?;

    if let Some(id) = inserted {
        record.attributes.insert(PRIMARY_KEY.to_string(), Value::Integer(id));
    }
    Ok(())
}

/// Delete a child row by its link and the parent row it links to
fn delete_pair(conn: &mut dyn Connection, child: &ModelDescriptor, parent_table: &str, link: Value) -> OrmResult<()> {
    let link_column = child
        .parent_link_column()
        .ok_or_else(|| OrmError::metadata(&child.name, "model has no parent table"))?;
    transaction(conn, |conn| {
        conn.delete(&child.table, &Filter::new().eq(link_column, link.clone()))?;
        conn.delete(parent_table, &Filter::new().eq(PRIMARY_KEY, link))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;
    use crate::backends::{MemoryDatabase, OperationKind, TableAccess};
    use crate::metadata::{ColumnDescriptor, ModelDefinition};
    use crate::registry::{ModelRegistry, BASE_MODEL};

    fn catalog() -> ModelCatalog {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Vehicle")
                    .extends(BASE_MODEL)
                    .table("vehicles")
                    .column("make", ColumnDescriptor::string()),
            )
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Car")
                    .extends("Vehicle")
                    .table_with_parent("cars", "Vehicle")
                    .column("doors", ColumnDescriptor::integer().default_value(4)),
            )
            .unwrap();
        ModelCatalog::new(registry)
    }

    fn database() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        db.create_table("vehicles", &["id", "created_at", "updated_at", "deleted_at", "make", "type"]);
        db.create_table("cars", &["id", "created_at", "updated_at", "deleted_at", "doors", "vehicle_id"]);
        db
    }

    #[test]
    fn test_create_inserts_parent_then_child() {
        let catalog = catalog();
        let mut db = database();

        let car = create(&catalog, &mut db, "Car", attributes! { "make" => "Volvo" }).unwrap();
        assert_eq!(car.get("make"), Some(&Value::from("Volvo")));
        assert_eq!(car.get("doors"), Some(&Value::Integer(4)));
        assert_eq!(car.parent_link(), Some(&Value::Integer(1)));
        assert!(car.exists());

        assert_eq!(db.rows("vehicles")[0]["type"], Value::from("Car"));
        assert_eq!(db.rows("cars")[0]["vehicle_id"], Value::Integer(1));
    }

    #[test]
    fn test_create_keeps_declared_type_column() {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Document")
                    .extends(BASE_MODEL)
                    .table("documents")
                    .column("type", ColumnDescriptor::string()),
            )
            .unwrap();
        let catalog = ModelCatalog::new(registry);
        let mut db = MemoryDatabase::new();
        db.create_table("documents", &["id", "created_at", "updated_at", "deleted_at", "type"]);

        let document = create(&catalog, &mut db, "Document", attributes! { "type" => "invoice" }).unwrap();
        assert_eq!(document.get("type"), Some(&Value::from("invoice")));
        assert_eq!(db.rows("documents")[0]["type"], Value::from("invoice"));
    }

    #[test]
    fn test_child_load_drops_link_and_keeps_child_key() {
        let catalog = catalog();
        let mut db = database();
        db.insert("vehicles", &attributes! { "id" => 7, "make" => "Saab", "type" => "Car" }).unwrap();
        db.insert("cars", &attributes! { "id" => 3, "doors" => 2, "vehicle_id" => 7 }).unwrap();

        let car = find(&catalog, &mut db, "Car", 3).unwrap().unwrap();
        assert_eq!(car.key(), Some(&Value::Integer(3)));
        assert_eq!(car.parent_link(), Some(&Value::Integer(7)));
        assert_eq!(car.get("make"), Some(&Value::from("Saab")));
        assert!(car.get("vehicle_id").is_none());
    }

    #[test]
    fn test_child_load_without_parent_row_fails() {
        let catalog = catalog();
        let mut db = database();
        db.insert("cars", &attributes! { "id" => 1, "doors" => 2, "vehicle_id" => 99 }).unwrap();

        let err = find(&catalog, &mut db, "Car", 1).unwrap_err();
        assert!(matches!(err, OrmError::MissingParentRow { .. }));
    }

    #[test]
    fn test_failed_parent_write_rolls_back_child_update() {
        let catalog = catalog();
        let mut db = database();
        let mut car = create(&catalog, &mut db, "Car", attributes! { "make" => "Volvo" }).unwrap();

        car.set("make", "Audi").set("doors", 5);
        db.fail_on(OperationKind::Update, "vehicles");
        assert!(save(&catalog, &mut db, &mut car).is_err());
        assert!(car.is_dirty());
        assert_eq!(db.rows("vehicles")[0]["make"], Value::from("Volvo"));
        assert_eq!(db.rows("cars")[0]["doors"], Value::Integer(4));
    }
}
