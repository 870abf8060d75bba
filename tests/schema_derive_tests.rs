use ember::schema::{SchemaType, ToSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A dish on the menu
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct MenuItem {
    #[schema(required, min_length = 1, max_length = 80)]
    display_name: String,
    /// Price in cents
    #[schema(minimum = 0)]
    price_cents: i64,
    #[serde(rename = "kind")]
    category: Category,
    #[serde(skip)]
    #[allow(dead_code)]
    internal_note: String,
    #[schema(skip)]
    #[serde(default)]
    cache_key: String,
    allergens: Vec<String>,
    #[schema(format = "email", example = "chef@example.com")]
    contact: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
enum Category {
    MainCourse,
    Dessert,
}

#[derive(Serialize, ToSchema)]
#[schema(rename = "Page")]
struct Paged<T> {
    items: Vec<T>,
    total: u64,
}

#[test]
fn test_struct_schema_follows_serde_names() {
    let schema = MenuItem::schema();
    assert_eq!(MenuItem::schema_name(), Some("MenuItem"));
    assert_eq!(schema.schema_type, Some(SchemaType::Object));
    assert_eq!(schema.description.as_deref(), Some("A dish on the menu"));

    let names: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["displayName", "priceCents", "kind", "allergens", "contact"]);
    assert_eq!(schema.required, vec!["displayName".to_string()]);

    let name = &schema.properties["displayName"];
    assert_eq!(name.min_length, Some(1));
    assert_eq!(name.max_length, Some(80));

    let price = &schema.properties["priceCents"];
    assert_eq!(price.minimum, Some(0.0));
    assert_eq!(price.description.as_deref(), Some("Price in cents"));

    let contact = &schema.properties["contact"];
    assert_eq!(contact.format.as_deref(), Some("email"));
    assert_eq!(contact.example, Some(json!("chef@example.com")));
}

#[test]
fn test_unit_enum_schema() {
    let schema = Category::schema();
    assert_eq!(schema.schema_type, Some(SchemaType::String));
    assert_eq!(schema.enum_values, vec![json!("main_course"), json!("dessert")]);
}

#[derive(Serialize, Deserialize, ToSchema)]
struct Leaf {
    #[schema(required)]
    id: u64,
    label: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct Root {
    #[schema(required)]
    leaf: Leaf,
    leaves: Vec<Leaf>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct Audit {
    #[schema(required)]
    created_by: String,
    updated_by: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct Document {
    #[schema(required)]
    title: String,
    #[serde(flatten)]
    audit: Audit,
    #[serde(skip_serializing, default)]
    password: String,
    #[serde(skip_deserializing)]
    revision: u32,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct Draft {
    title: String,
    #[serde(flatten)]
    audit: Option<Audit>,
}

#[test]
fn test_generic_instances_get_distinct_components() {
    assert_eq!(Paged::<MenuItem>::schema_name(), Some("Page_MenuItem"));
    assert_eq!(Paged::<i64>::schema_name(), Some("Page_i64"));
    assert_eq!(Paged::<Vec<String>>::schema_name(), Some("Page_Vec_String"));
    assert_eq!(Paged::<Paged<i64>>::schema_name(), Some("Page_Page_i64"));
    let schema = Paged::<String>::schema();
    assert_eq!(schema.properties["items"].schema_type, Some(SchemaType::Array));
    assert_eq!(
        schema.properties["items"].items.as_ref().unwrap().schema_type,
        Some(SchemaType::String)
    );
}

#[test]
fn test_sequences_tag_by_element() {
    assert_eq!(<Vec<MenuItem>>::tag_name(), Some("MenuItem"));
    assert_eq!(<Vec<MenuItem>>::schema_name(), None);
    assert!(<()>::is_unit());
}

#[test]
fn test_nested_required_fields_stay_on_the_nested_schema() {
    let schema = Root::schema();
    assert_eq!(schema.required, vec!["leaf".to_string()]);

    let leaf = &schema.properties["leaf"];
    assert_eq!(leaf.schema_type, Some(SchemaType::Object));
    assert_eq!(leaf.required, vec!["id".to_string()]);

    let items = schema.properties["leaves"].items.as_ref().unwrap();
    assert_eq!(items.required, vec!["id".to_string()]);
}

#[test]
fn test_flatten_merges_fields_into_parent() {
    let schema = Document::schema();
    let names: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["title", "created_by", "updated_by", "password", "revision"]
    );
    assert!(!schema.properties.contains_key("audit"));
    assert_eq!(
        schema.required,
        vec!["title".to_string(), "created_by".to_string()]
    );

    let draft = Draft::schema();
    assert!(draft.properties.contains_key("created_by"));
    assert!(draft.required.is_empty());
}
