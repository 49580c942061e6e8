//! Relation loading through the table-access collaborator
//!
//! Related records are fetched without their own eager list, so cyclic
//! `with` declarations cannot recurse. Nested `load` paths are applied on
//! the fetched records.

use tracing::debug;

use crate::backends::{Connection, Filter};
use crate::error::OrmResult;
use crate::model::{ModelCatalog, Record};
use crate::persistence;
use crate::value::Value;

use super::definition::{Related, RelationDefinition, RelationKind};

/// Materialise one relation of `owner`, then its nested load paths
pub fn load_relation(
    catalog: &ModelCatalog,
    conn: &mut dyn Connection,
    owner: &Record,
    relation: &RelationDefinition,
) -> OrmResult<Related> {
    debug!("Loading relation '{}' of {}", relation.name, owner.model());

    let mut related = match &relation.kind {
        RelationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => match key_value(owner, foreign_key) {
            Some(value) => Related::One(first(catalog, conn, &relation.related, Filter::new().eq(owner_key, value))?),
            None => Related::One(None),
        },
        RelationKind::HasOne {
            foreign_key,
            local_key,
        } => match key_value(owner, local_key) {
            Some(value) => Related::One(first(catalog, conn, &relation.related, Filter::new().eq(foreign_key, value))?),
            None => Related::One(None),
        },
        RelationKind::HasMany {
            foreign_key,
            local_key,
        } => match key_value(owner, local_key) {
            Some(value) => Related::Many(persistence::select(
                catalog,
                conn,
                &relation.related,
                &Filter::new().eq(foreign_key, value),
            )?),
            None => Related::Many(Vec::new()),
        },
        RelationKind::HasOneThrough {
            through,
            first_key,
            second_key,
            local_key,
            second_local_key,
        } => {
            let intermediate = match key_value(owner, local_key) {
                Some(value) => first(catalog, conn, through, Filter::new().eq(first_key, value))?,
                None => None,
            };
            match intermediate.and_then(|row| key_value(&row, second_local_key)) {
                Some(value) => {
                    Related::One(first(catalog, conn, &relation.related, Filter::new().eq(second_key, value))?)
                }
                None => Related::One(None),
            }
        }
    };

    for path in &relation.load {
        for record in related.records_mut() {
            load_path(catalog, conn, record, path)?;
        }
    }

    Ok(related)
}

/// Load a dot-separated relation path on `record`
pub fn load_path(catalog: &ModelCatalog, conn: &mut dyn Connection, record: &mut Record, path: &str) -> OrmResult<()> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    record.load(catalog, conn, head)?;

    if let Some(rest) = rest {
        if let Some(related) = record.loaded_relation_mut(head) {
            for nested in related.records_mut() {
                load_path(catalog, conn, nested, rest)?;
            }
        }
    }
    Ok(())
}

fn key_value(record: &Record, column: &str) -> Option<Value> {
    record.get(column).filter(|value| !value.is_null()).cloned()
}

fn first(catalog: &ModelCatalog, conn: &mut dyn Connection, model: &str, filter: Filter) -> OrmResult<Option<Box<Record>>> {
    Ok(persistence::select(catalog, conn, model, &filter)?
        .into_iter()
        .next()
        .map(Box::new))
}
