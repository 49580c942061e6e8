use column_orm::metadata::{ColumnDescriptor, ModelDefinition, PropertyDefinition};
use column_orm::migrations::{FieldDefinition, MigrationKind, MigrationSynthesizer, SchemaChange};
use column_orm::{ColumnOrigin, ColumnResolver, ModelRegistry, Reflector, BASE_MODEL};
use pretty_assertions::assert_eq;

fn vehicles() -> ModelRegistry {
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
                .column("doors", ColumnDescriptor::integer()),
        )
        .unwrap();
    registry
        .register(
            ModelDefinition::new("SportsCar")
                .extends("Car")
                .table_with_parent("sports_cars", "Car")
                .column("topSpeed", ColumnDescriptor::integer()),
        )
        .unwrap();
    registry
}

fn names(registry: &ModelRegistry, model: &str) -> Vec<String> {
    ColumnResolver::new(registry)
        .resolve(model)
        .unwrap()
        .names()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_resolution_is_deterministic() {
    let registry = vehicles();
    for model in ["Vehicle", "Car", "SportsCar"] {
        assert_eq!(names(&registry, model), names(&registry, model));
    }
}

#[test]
fn test_grandchild_does_not_duplicate_base_declared_columns() {
    let registry = vehicles();
    assert_eq!(
        names(&registry, "SportsCar"),
        vec!["id", "created_at", "updated_at", "deleted_at", "top_speed", "car_id"]
    );
    assert_eq!(
        names(&registry, "Car"),
        vec!["id", "created_at", "updated_at", "deleted_at", "doors", "vehicle_id", "type"]
    );
}

#[test]
fn test_discriminator_is_appended_after_parent_link() {
    let registry = vehicles();
    let resolver = ColumnResolver::new(&registry);

    let vehicle = resolver.resolve("Vehicle").unwrap();
    let last = vehicle.iter().last().unwrap();
    assert_eq!(last.name, "type");
    assert_eq!(last.origin, ColumnOrigin::Discriminator);
    assert!(last.descriptor.nullable && last.descriptor.hidden);
    assert_eq!(last.descriptor.sql_type, "string");

    let car = resolver.resolve("Car").unwrap();
    assert_eq!(car.position("vehicle_id"), Some(car.len() - 2));
    assert_eq!(car.position("type"), Some(car.len() - 1));
    assert!(!car.get("vehicle_id").unwrap().descriptor.fillable);
    assert!(!car.get("type").unwrap().descriptor.fillable);
}

#[test]
fn test_declared_type_column_suppresses_discriminator() {
    let mut registry = vehicles();
    registry
        .register(
            ModelDefinition::new("Animal")
                .extends(BASE_MODEL)
                .table("animals")
                .column("type", ColumnDescriptor::string().length(40)),
        )
        .unwrap();
    registry
        .register(ModelDefinition::new("Dog").extends("Animal").table_with_parent("dogs", "Animal").column(
            "breed",
            ColumnDescriptor::string(),
        ))
        .unwrap();

    let animal = ColumnResolver::new(&registry).resolve("Animal").unwrap();
    assert_eq!(animal.get("type").unwrap().origin, ColumnOrigin::Declared);
    assert_eq!(animal.get("type").unwrap().descriptor.length, Some(40));
    assert_eq!(Reflector::new(&registry).find_child_types("Animal"), vec!["Dog"]);
}

#[test]
fn test_model_typed_property_becomes_integer_foreign_key() {
    let mut registry = ModelRegistry::with_base();
    registry
        .register(ModelDefinition::new("Customer").extends(BASE_MODEL).column("name", ColumnDescriptor::string()))
        .unwrap();
    registry
        .register(
            ModelDefinition::new("Order")
                .extends(BASE_MODEL)
                .property(PropertyDefinition::new("customer").model("Customer").column(ColumnDescriptor::string()))
                .property(
                    PropertyDefinition::new("buyer")
                        .model("Customer")
                        .column(ColumnDescriptor::string().named("purchaser")),
                ),
        )
        .unwrap();

    let order = ColumnResolver::new(&registry).resolve("Order").unwrap();
    let customer = order.get("customer_id").unwrap();
    assert_eq!(customer.descriptor.sql_type, "integer");
    assert_eq!(customer.related.as_deref(), Some("Customer"));

    let buyer = order.get("purchaser").unwrap();
    assert_eq!(buyer.descriptor.sql_type, "integer");
    assert!(!order.contains("buyer"));
    assert_eq!(Reflector::new(&registry).describe_table("Order").table, "orders");
}

#[test]
fn test_invoice_initial_migration_fields() {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            ModelDefinition::new("Invoice")
                .table("invoices")
                .column("id", ColumnDescriptor::id())
                .column("amount", ColumnDescriptor::integer())
                .column("created_at", ColumnDescriptor::timestamps())
                .column("updated_at", ColumnDescriptor::timestamps()),
        )
        .unwrap();

    let columns = ColumnResolver::new(&registry).resolve("Invoice").unwrap();
    let artifact = MigrationSynthesizer::new().synthesize_initial("Invoice", "invoices", &columns);
    assert_eq!(artifact.kind, MigrationKind::Create);

    let SchemaChange::CreateTable { fields, .. } = &artifact.up[0] else {
        panic!("expected a create-table change");
    };
    assert_eq!(
        fields,
        &vec![
            FieldDefinition::Id,
            FieldDefinition::Column {
                name: "amount".to_string(),
                sql_type: "integer".to_string(),
                length: None,
                nullable: false,
                default: None,
                index: false,
            },
            FieldDefinition::Timestamps,
        ]
    );
    assert!(!fields.contains(&FieldDefinition::SoftDeletes));
}

#[test]
fn test_model_without_columns_is_metadata_error() {
    let mut registry = ModelRegistry::new();
    registry.register(ModelDefinition::new("Empty").table("empties")).unwrap();
    let err = ColumnResolver::new(&registry).resolve("Empty").unwrap_err();
    assert!(err.is_discovery_error());
}
