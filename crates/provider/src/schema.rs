//! Terraform Schema Definitions
//!
//! Resources describe their attributes with the builders below. The same
//! description drives the protocol schema, state conformance, value
//! validation and plan computation.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};

use crate::state::DynamicValue;
use crate::tfplugin6::{self, attribute_path, diagnostic, schema, AttributePath, Diagnostic};

/// cty attribute type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
    Object(Vec<(&'static str, AttrType)>),
}

impl AttrType {
    pub fn list(inner: AttrType) -> Self {
        AttrType::List(Box::new(inner))
    }

    pub fn set(inner: AttrType) -> Self {
        AttrType::Set(Box::new(inner))
    }

    pub fn map(inner: AttrType) -> Self {
        AttrType::Map(Box::new(inner))
    }

    pub fn string_list() -> Self {
        AttrType::list(AttrType::String)
    }

    pub fn string_map() -> Self {
        AttrType::map(AttrType::String)
    }

    /// List of objects, the shape of computed nested structures.
    pub fn object_list(fields: Vec<(&'static str, AttrType)>) -> Self {
        AttrType::list(AttrType::Object(fields))
    }

    /// JSON type constraint as Terraform expects it.
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttrType::String => json!("string"),
            AttrType::Number => json!("number"),
            AttrType::Bool => json!("bool"),
            AttrType::List(inner) => json!(["list", inner.to_json()]),
            AttrType::Set(inner) => json!(["set", inner.to_json()]),
            AttrType::Map(inner) => json!(["map", inner.to_json()]),
            AttrType::Object(fields) => {
                let fields: serde_json::Map<String, JsonValue> = fields
                    .iter()
                    .map(|(name, ty)| (name.to_string(), ty.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    /// Coerces a value into this type the way the legacy SDK did
    /// (numbers and bools into strings and back), filling object fields.
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        match (self, value) {
            (_, DynamicValue::Null) | (_, DynamicValue::Unknown) => value.clone(),
            (AttrType::String, DynamicValue::Number(n)) => DynamicValue::String(n.to_string()),
            (AttrType::String, DynamicValue::Bool(b)) => DynamicValue::String(b.to_string()),
            (AttrType::Number, DynamicValue::String(s)) => s
                .parse::<serde_json::Number>()
                .map(DynamicValue::Number)
                .unwrap_or(DynamicValue::Null),
            (AttrType::Bool, DynamicValue::String(s)) => match s.as_str() {
                "true" => DynamicValue::Bool(true),
                "false" => DynamicValue::Bool(false),
                _ => DynamicValue::Null,
            },
            (AttrType::List(inner), DynamicValue::List(items))
            | (AttrType::Set(inner), DynamicValue::List(items)) => {
                DynamicValue::List(items.iter().map(|v| inner.conform(v)).collect())
            }
            (AttrType::Map(inner), DynamicValue::Map(m)) => DynamicValue::Map(
                m.iter().map(|(k, v)| (k.clone(), inner.conform(v))).collect(),
            ),
            (AttrType::Object(fields), DynamicValue::Map(m)) => DynamicValue::Map(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let v = m.get(*name).map(|v| ty.conform(v)).unwrap_or_default();
                        (name.to_string(), v)
                    })
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

/// Value check run during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// The string must be one of the listed values.
    OneOf(&'static [&'static str]),
}

impl Validator {
    fn check(&self, name: &str, value: &DynamicValue) -> Option<String> {
        match self {
            Validator::OneOf(allowed) => {
                let v = value.as_string()?;
                if allowed.contains(&v) {
                    return None;
                }
                let quoted: Vec<String> = allowed.iter().map(|a| format!("{:?}", a)).collect();
                Some(format!(
                    "expected {} to be one of [{}], got {}",
                    name,
                    quoted.join(" "),
                    v
                ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: AttrType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// A change forces the resource to be replaced.
    pub force_new: bool,
    pub validator: Option<Validator>,
}

impl Attribute {
    fn new(name: &'static str, ty: AttrType) -> Self {
        Self {
            name,
            ty,
            description: "",
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            validator: None,
        }
    }

    pub fn required(name: &'static str, ty: AttrType) -> Self {
        Self {
            required: true,
            ..Self::new(name, ty)
        }
    }

    pub fn optional(name: &'static str, ty: AttrType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }

    pub fn computed(name: &'static str, ty: AttrType) -> Self {
        Self {
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn optional_computed(name: &'static str, ty: AttrType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.validator = Some(Validator::OneOf(allowed));
        self
    }

    fn to_proto(&self) -> schema::Attribute {
        schema::Attribute {
            name: self.name.to_string(),
            r#type: self.ty.to_json().to_string().into_bytes(),
            description: self.description.to_string(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            description_kind: tfplugin6::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Single,
    List,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedBlock {
    pub name: &'static str,
    pub block: Block,
    pub nesting: Nesting,
    pub min_items: i64,
    pub max_items: i64,
    pub force_new: bool,
}

impl NestedBlock {
    pub fn list(name: &'static str, block: Block) -> Self {
        Self {
            name,
            block,
            nesting: Nesting::List,
            min_items: 0,
            max_items: 0,
            force_new: false,
        }
    }

    pub fn set(name: &'static str, block: Block) -> Self {
        Self {
            nesting: Nesting::Set,
            ..Self::list(name, block)
        }
    }

    pub fn single(name: &'static str, block: Block) -> Self {
        Self {
            nesting: Nesting::Single,
            ..Self::list(name, block)
        }
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.max_items = n;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    fn to_proto(&self) -> schema::NestedBlock {
        let nesting = match self.nesting {
            Nesting::Single => schema::nested_block::NestingMode::Single,
            Nesting::List => schema::nested_block::NestingMode::List,
            Nesting::Set => schema::nested_block::NestingMode::Set,
        };
        schema::NestedBlock {
            type_name: self.name.to_string(),
            block: Some(self.block.to_proto()),
            nesting: nesting as i32,
            min_items: self.min_items,
            max_items: self.max_items,
        }
    }

    fn conform(&self, value: Option<&DynamicValue>) -> DynamicValue {
        match self.nesting {
            Nesting::Single => match value {
                Some(DynamicValue::List(items)) => items
                    .first()
                    .map(|v| self.block.conform(v))
                    .unwrap_or_default(),
                Some(v) => self.block.conform(v),
                None => DynamicValue::Null,
            },
            Nesting::List | Nesting::Set => match value {
                Some(DynamicValue::List(items)) => {
                    DynamicValue::List(items.iter().map(|v| self.block.conform(v)).collect())
                }
                Some(DynamicValue::Unknown) => DynamicValue::Unknown,
                Some(v @ DynamicValue::Map(_)) => DynamicValue::List(vec![self.block.conform(v)]),
                _ => DynamicValue::List(vec![]),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<NestedBlock>,
    pub description: &'static str,
}

impl Block {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            blocks: vec![],
            description: "",
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<NestedBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Object type with one field per attribute and nested block.
    pub fn object_type(&self) -> AttrType {
        let mut fields: Vec<(&'static str, AttrType)> =
            self.attributes.iter().map(|a| (a.name, a.ty.clone())).collect();
        fields.extend(
            self.blocks
                .iter()
                .map(|b| (b.name, AttrType::list(b.block.object_type()))),
        );
        AttrType::Object(fields)
    }

    /// Every attribute and nested block as a read-only attribute, for data
    /// sources that expose what a resource manages. Names in `skip` and the
    /// `timeouts` block are left out.
    pub fn computed_attributes(&self, skip: &[&str]) -> Vec<Attribute> {
        let attrs = self.attributes.iter().map(|a| Attribute {
            computed: true,
            required: false,
            optional: false,
            force_new: false,
            validator: None,
            ..a.clone()
        });
        let blocks = self
            .blocks
            .iter()
            .filter(|b| b.name != "timeouts")
            .map(|b| Attribute::computed(b.name, AttrType::list(b.block.object_type())));
        attrs
            .chain(blocks)
            .filter(|a| !skip.contains(&a.name))
            .collect()
    }

    pub fn to_proto(&self) -> schema::Block {
        schema::Block {
            version: 0,
            attributes: self.attributes.iter().map(Attribute::to_proto).collect(),
            block_types: self.blocks.iter().map(NestedBlock::to_proto).collect(),
            description: self.description.to_string(),
            description_kind: tfplugin6::StringKind::Plain as i32,
            deprecated: false,
        }
    }

    /// Shapes `value` into exactly this block's attributes: unknown keys are
    /// dropped, missing attributes become null, missing list blocks empty.
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        let source = match value {
            DynamicValue::Map(m) => m,
            DynamicValue::Unknown => return DynamicValue::Unknown,
            _ => return DynamicValue::Null,
        };

        let mut out = HashMap::new();
        for attr in &self.attributes {
            let v = source
                .get(attr.name)
                .map(|v| attr.ty.conform(v))
                .unwrap_or_default();
            out.insert(attr.name.to_string(), v);
        }
        for nested in &self.blocks {
            out.insert(nested.name.to_string(), nested.conform(source.get(nested.name)));
        }
        DynamicValue::Map(out)
    }

    /// Runs attribute validators over known values.
    pub fn validate(&self, value: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = vec![];
        self.validate_at(value, &mut vec![], &mut diagnostics);
        diagnostics
    }

    fn validate_at(
        &self,
        value: &DynamicValue,
        path: &mut Vec<attribute_path::step::Selector>,
        out: &mut Vec<Diagnostic>,
    ) {
        let Some(map) = value.as_map() else {
            return;
        };

        for attr in &self.attributes {
            let (Some(validator), Some(v)) = (&attr.validator, map.get(attr.name)) else {
                continue;
            };
            if let Some(detail) = validator.check(attr.name, v) {
                path.push(attribute_path::step::Selector::AttributeName(attr.name.to_string()));
                out.push(Diagnostic {
                    severity: diagnostic::Severity::Error as i32,
                    summary: "Invalid attribute value".to_string(),
                    detail,
                    attribute: Some(attribute_path(path)),
                });
                path.pop();
            }
        }

        for nested in &self.blocks {
            let Some(v) = map.get(nested.name) else {
                continue;
            };
            path.push(attribute_path::step::Selector::AttributeName(nested.name.to_string()));
            match v {
                DynamicValue::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        path.push(attribute_path::step::Selector::ElementKeyInt(i as i64));
                        nested.block.validate_at(item, path, out);
                        path.pop();
                    }
                }
                other => nested.block.validate_at(other, path, out),
            }
            path.pop();
        }
    }

    /// Computes the planned state and the attributes that force replacement.
    ///
    /// On create, computed attributes the configuration leaves null become
    /// unknown. On update they keep their prior value.
    pub fn plan(
        &self,
        prior: &DynamicValue,
        proposed: &DynamicValue,
    ) -> (DynamicValue, Vec<AttributePath>) {
        if proposed.is_null() {
            return (DynamicValue::Null, vec![]);
        }

        let creating = prior.is_null();
        let planned = self.plan_value(if creating { None } else { Some(prior) }, proposed);

        let mut requires_replace = vec![];
        if !creating {
            for attr in self.attributes.iter().filter(|a| a.force_new) {
                if planned.get(attr.name) != prior.get(attr.name) {
                    requires_replace.push(attribute_path(&[
                        attribute_path::step::Selector::AttributeName(attr.name.to_string()),
                    ]));
                }
            }
            for nested in self.blocks.iter().filter(|b| b.force_new) {
                if planned.get(nested.name) != prior.get(nested.name) {
                    requires_replace.push(attribute_path(&[
                        attribute_path::step::Selector::AttributeName(nested.name.to_string()),
                    ]));
                }
            }
        }

        (planned, requires_replace)
    }

    fn plan_value(&self, prior: Option<&DynamicValue>, proposed: &DynamicValue) -> DynamicValue {
        let DynamicValue::Map(source) = proposed else {
            return proposed.clone();
        };

        let mut out = source.clone();
        for attr in self.attributes.iter().filter(|a| a.computed) {
            let current = source.get(attr.name).cloned().unwrap_or_default();
            if !current.is_null() {
                continue;
            }
            let planned = match prior.and_then(|p| p.get(attr.name)) {
                Some(previous) => previous.clone(),
                None => DynamicValue::Unknown,
            };
            out.insert(attr.name.to_string(), planned);
        }

        for nested in &self.blocks {
            let Some(current) = source.get(nested.name) else {
                continue;
            };
            let previous = prior.and_then(|p| p.get(nested.name));
            let planned = match current {
                DynamicValue::List(items) => DynamicValue::List(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let prior_item = previous
                                .and_then(|p| p.as_list())
                                .and_then(|list| list.get(i));
                            nested.block.plan_value(prior_item, item)
                        })
                        .collect(),
                ),
                DynamicValue::Map(_) => nested.block.plan_value(previous, current),
                other => other.clone(),
            };
            out.insert(nested.name.to_string(), planned);
        }

        DynamicValue::Map(out)
    }
}

/// Versioned top-level schema of a resource, data source or the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }

    pub fn to_proto(&self) -> tfplugin6::Schema {
        tfplugin6::Schema {
            version: self.version,
            block: Some(self.block.to_proto()),
        }
    }
}

pub fn attribute_path(selectors: &[attribute_path::step::Selector]) -> AttributePath {
    AttributePath {
        steps: selectors
            .iter()
            .map(|s| attribute_path::Step {
                selector: Some(s.clone()),
            })
            .collect(),
    }
}

/// The `id` attribute every resource carries.
pub fn id_attribute() -> Attribute {
    Attribute::computed("id", AttrType::String)
}
