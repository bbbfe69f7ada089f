use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Slug prefix Webflow gives to CMS template pages.
pub const TEMPLATE_SLUG_PREFIX: &str = "detail_";

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub total: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SitesResponse {
    #[serde(default)]
    pub sites: Vec<Site>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Seo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub published_path: Option<String>,
    #[serde(default)]
    pub seo: Option<Seo>,
    #[serde(default)]
    pub open_graph: Option<Seo>,
}

impl Page {
    /// Drafts, archived pages and CMS templates never reach the output.
    pub fn is_published(&self) -> bool {
        !self.draft && !self.archived && !self.slug.starts_with(TEMPLATE_SLUG_PREFIX)
    }

    /// Key used for the page document; the root page is stored as `index`.
    pub fn document_slug(&self) -> &str {
        match self.slug.as_str() {
            "" | "/" => "index",
            slug => slug,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.seo
            .as_ref()
            .and_then(|seo| seo.description.as_deref())
            .filter(|d| !d.is_empty())
            .or_else(|| {
                self.open_graph
                    .as_ref()
                    .and_then(|og| og.description.as_deref())
                    .filter(|d| !d.is_empty())
            })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PagesResponse {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RichText {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Choice {
    pub value: String,
    pub text: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum OverrideKind {
    #[serde(rename = "Plain Text")]
    PlainText,
    #[serde(rename = "Rich Text")]
    RichText,
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyOverride {
    pub property_id: String,
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub text: Option<RichText>,
}

/// One entry of a page or component DOM listing.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Node {
    Text {
        id: String,
        #[serde(default)]
        text: Option<RichText>,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
    Image {
        id: String,
        #[serde(default)]
        image: Option<ImageRef>,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
    Select {
        id: String,
        #[serde(default)]
        choices: Vec<Choice>,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
    TextInput {
        id: String,
        #[serde(default)]
        placeholder: Option<String>,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
    SubmitButton {
        id: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        waiting_text: Option<String>,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
    ComponentInstance {
        id: String,
        #[serde(default)]
        component_id: Option<String>,
        #[serde(default)]
        property_overrides: Vec<PropertyOverride>,
    },
    #[serde(other)]
    Unknown,
}

impl Node {
    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Text { id, .. }
            | Node::Image { id, .. }
            | Node::Select { id, .. }
            | Node::TextInput { id, .. }
            | Node::SubmitButton { id, .. }
            | Node::ComponentInstance { id, .. } => Some(id),
            Node::Unknown => None,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            Node::Text {
                text: Some(RichText { html: Some(html), .. }),
                ..
            } => Some(html),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NodesResponse {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ComponentsResponse {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub singular_name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CollectionsResponse {
    #[serde(default)]
    pub collections: Vec<CollectionSummary>,
}

/// Semantic type of a CMS field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    PlainText,
    RichText,
    Date,
    Image,
    MultiImage,
    Video,
    Link,
    Email,
    Phone,
    Boolean,
    Select,
    Reference,
    MultiReference,
    Color,
    Number,
    File,
    CreatedOn,
    ModifiedOn,
    Other(String),
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag {
            "PlainText" => FieldType::PlainText,
            "RichText" => FieldType::RichText,
            "Date" | "DateTime" => FieldType::Date,
            "Image" => FieldType::Image,
            "MultiImage" => FieldType::MultiImage,
            "Video" | "VideoLink" => FieldType::Video,
            "Link" => FieldType::Link,
            "Email" => FieldType::Email,
            "Phone" => FieldType::Phone,
            "Boolean" | "Switch" => FieldType::Boolean,
            "Option" | "Select" => FieldType::Select,
            "Reference" | "ItemRef" => FieldType::Reference,
            "MultiReference" | "ItemRefSet" => FieldType::MultiReference,
            "Color" => FieldType::Color,
            "Number" => FieldType::Number,
            "File" => FieldType::File,
            "CreatedOn" => FieldType::CreatedOn,
            "ModifiedOn" => FieldType::ModifiedOn,
            other => FieldType::Other(other.to_owned()),
        }
    }
}

impl FieldType {
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference | FieldType::MultiReference)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::PlainText | FieldType::RichText)
    }
}

/// Raw `validations` object of a field; only a few keys carry meaning here.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Validations(pub serde_json::Map<String, Value>);

impl Validations {
    pub fn collection_id(&self) -> Option<&str> {
        self.0
            .get("collectionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// A present `maxCount` other than exactly 1 marks a multi-valued reference.
    pub fn allows_many(&self) -> bool {
        match self.0.get("maxCount") {
            Some(max) => max.as_u64() != Some(1),
            None => false,
        }
    }

    pub fn option_name<'a>(&'a self, option_id: &'a str) -> &'a str {
        self.0
            .get("options")
            .and_then(Value::as_array)
            .and_then(|options| {
                options
                    .iter()
                    .find(|option| option.get("id").and_then(Value::as_str) == Some(option_id))
            })
            .and_then(|option| option.get("name").and_then(Value::as_str))
            .unwrap_or(option_id)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawField {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub validations: Option<Validations>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawCollection {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub singular_name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionField {
    pub id: String,
    pub slug: String,
    pub display_name: String,
    pub description: Option<String>,
    pub field_type: FieldType,
    pub required: bool,
    pub validations: Validations,
}

impl From<RawField> for CollectionField {
    fn from(raw: RawField) -> Self {
        let validations = raw.validations.unwrap_or_default();
        let field_type = match FieldType::from(raw.kind.as_str()) {
            FieldType::Reference if validations.allows_many() => FieldType::MultiReference,
            other => other,
        };
        Self {
            id: raw.id,
            display_name: if raw.display_name.is_empty() {
                raw.slug.clone()
            } else {
                raw.display_name
            },
            slug: raw.slug,
            description: raw.help_text.filter(|text| !text.is_empty()),
            field_type,
            required: raw.required,
            validations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub singular_name: String,
    pub last_updated: Option<String>,
    pub fields: Vec<CollectionField>,
}

impl From<RawCollection> for CollectionSchema {
    fn from(raw: RawCollection) -> Self {
        Self {
            name: raw
                .display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            slug: raw.slug.unwrap_or_default(),
            singular_name: raw.singular_name.unwrap_or_default(),
            last_updated: raw.last_updated,
            fields: raw.fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl CollectionSchema {
    /// Fields keyed by slug, which is how item `fieldData` is keyed.
    pub fn field_map(&self) -> IndexMap<String, CollectionField> {
        self.fields
            .iter()
            .map(|field| (field.slug.clone(), field.clone()))
            .collect()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub id: String,
    #[serde(default)]
    pub field_data: IndexMap<String, Value>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub last_published: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<CollectionItem>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AssetsResponse {
    #[serde(default, alias = "items")]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}
