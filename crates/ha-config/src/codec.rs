//! YAML codec that keeps Home Assistant custom tags intact
//!
//! Recognized tags are kept as [`CustomTagValue`] nodes instead of being
//! resolved, so a document can be read, edited and written back without
//! losing its include directives or secret references:
//! - `!include path`
//! - `!include_dir_list dir`
//! - `!include_dir_named dir`
//! - `!include_dir_merge_list dir`
//! - `!include_dir_merge_named dir`
//! - `!secret key`
//! - `!env_var VAR`
//! - `!input name`
//!
//! Any other tag is carried through as an opaque [`TaggedNode`].
//! Mapping order is preserved on both parse and serialize.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{
    self, Deserialize, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Number, Value};
use tracing::trace;

use crate::error::{ConfigError, ConfigResult};

/// Custom tags used by Home Assistant configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaTag {
    Include,
    IncludeDirList,
    IncludeDirNamed,
    IncludeDirMergeList,
    IncludeDirMergeNamed,
    Secret,
    EnvVar,
    Input,
}

impl HaTag {
    pub const ALL: [HaTag; 8] = [
        HaTag::Include,
        HaTag::IncludeDirList,
        HaTag::IncludeDirNamed,
        HaTag::IncludeDirMergeList,
        HaTag::IncludeDirMergeNamed,
        HaTag::Secret,
        HaTag::EnvVar,
        HaTag::Input,
    ];

    /// Tag as written in YAML, including the leading `!`
    pub fn as_str(&self) -> &'static str {
        match self {
            HaTag::Include => "!include",
            HaTag::IncludeDirList => "!include_dir_list",
            HaTag::IncludeDirNamed => "!include_dir_named",
            HaTag::IncludeDirMergeList => "!include_dir_merge_list",
            HaTag::IncludeDirMergeNamed => "!include_dir_merge_named",
            HaTag::Secret => "!secret",
            HaTag::EnvVar => "!env_var",
            HaTag::Input => "!input",
        }
    }
}

impl fmt::Display for HaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HaTag {
    type Err = ();

    /// Accepts the tag with or without its leading `!`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix('!').unwrap_or(s);
        HaTag::ALL
            .into_iter()
            .find(|tag| &tag.as_str()[1..] == bare)
            .ok_or(())
    }
}

/// A recognized custom tag and its scalar payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomTagValue {
    pub tag: HaTag,
    pub value: String,
}

impl CustomTagValue {
    pub fn new(tag: HaTag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

/// A tag this codec does not know, with its (converted) content
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedNode {
    pub tag: String,
    pub value: ConfigValue,
}

/// Scalar mapping key
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum ConfigKey {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Eq for ConfigKey {}

impl ConfigKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigKey::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ConfigKey {
    fn from(s: &str) -> Self {
        ConfigKey::String(s.to_string())
    }
}

impl From<String> for ConfigKey {
    fn from(s: String) -> Self {
        ConfigKey::String(s)
    }
}

/// Ordered mapping node
pub type ConfigMap = IndexMap<ConfigKey, ConfigValue>;

/// A node of a parsed configuration document
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(ConfigMap),
    CustomTag(CustomTagValue),
    Tagged(Box<TaggedNode>),
}

impl ConfigValue {
    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            ConfigValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_custom_tag(&self) -> Option<&CustomTagValue> {
        match self {
            ConfigValue::CustomTag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Short description of the node kind, for error messages
    pub fn kind(&self) -> String {
        match self {
            ConfigValue::Null => "null".to_string(),
            ConfigValue::Bool(_) => "a boolean".to_string(),
            ConfigValue::Number(_) => "a number".to_string(),
            ConfigValue::String(_) => "a string".to_string(),
            ConfigValue::Sequence(_) => "a list".to_string(),
            ConfigValue::Mapping(_) => "a mapping".to_string(),
            ConfigValue::CustomTag(t) => format!("a {} tag", t.tag),
            ConfigValue::Tagged(t) => format!("a {} tag", t.tag),
        }
    }

    /// Look up a key when this node is a mapping
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_mapping()?.get(&ConfigKey::from(key))
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        ConfigValue::Sequence(items.into_iter().map(ConfigValue::String).collect())
    }
}

/// A parsed configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: ConfigValue,
}

impl ConfigDocument {
    pub fn new(root: ConfigValue) -> Self {
        Self { root }
    }

    /// Parse a YAML document
    pub fn parse(content: &str) -> ConfigResult<Self> {
        parse_document(content)
    }

    /// Serialize back to YAML
    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        serialize_document(self)
    }

    pub fn root(&self) -> &ConfigValue {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ConfigValue {
        &mut self.root
    }

    /// Follow a path of mapping keys
    pub fn get_path(&self, path: &[&str]) -> Option<&ConfigValue> {
        path.iter().try_fold(&self.root, |node, key| node.get(key))
    }

    /// Make sure every key on `path` resolves to a mapping and return the last one
    ///
    /// Missing and null nodes are replaced by empty mappings. Any other
    /// non-mapping node is left untouched and reported as a conflict.
    pub fn ensure_mapping_path(&mut self, path: &[&str]) -> ConfigResult<&mut ConfigMap> {
        if self.root.is_null() {
            self.root = ConfigValue::Mapping(ConfigMap::new());
        }

        let mut node = &mut self.root;
        let mut walked = String::new();
        for key in path {
            let map = match node {
                ConfigValue::Mapping(map) => map,
                other => {
                    return Err(ConfigError::MergeConflict {
                        key: if walked.is_empty() {
                            "<root>".to_string()
                        } else {
                            walked
                        },
                        found: other.kind(),
                    })
                }
            };

            if !walked.is_empty() {
                walked.push('.');
            }
            walked.push_str(key);

            let child = map
                .entry(ConfigKey::from(*key))
                .or_insert(ConfigValue::Null);
            if child.is_null() {
                *child = ConfigValue::Mapping(ConfigMap::new());
            }
            node = child;
        }

        match node {
            ConfigValue::Mapping(map) => Ok(map),
            other => Err(ConfigError::MergeConflict {
                key: if walked.is_empty() {
                    "<root>".to_string()
                } else {
                    walked
                },
                found: other.kind(),
            }),
        }
    }
}

/// Parse YAML text into a [`ConfigDocument`]
///
/// An empty document parses to a null root.
pub fn parse_document(content: &str) -> ConfigResult<ConfigDocument> {
    let VerbatimTags(value) =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml { source: e })?;
    Ok(ConfigDocument::new(from_yaml(value)?))
}

/// Serialize a [`ConfigDocument`] to YAML text
///
/// Custom tag payloads are written as they were read: `!secret 0x1F` stays
/// unquoted and an empty payload is written as a bare tag.
pub fn serialize_document(document: &ConfigDocument) -> ConfigResult<String> {
    let mut verbatim = Vec::new();
    let value = to_yaml(&document.root, &mut verbatim);
    let mut text =
        serde_yaml::to_string(&value).map_err(|e| ConfigError::SerializeYaml { source: e })?;

    for (index, custom) in verbatim.iter().enumerate() {
        let placeholder = format!("{} {}", custom.tag, payload_marker(index));
        let written = if custom.value.is_empty() {
            custom.tag.as_str().to_string()
        } else {
            format!("{} {}", custom.tag, custom.value)
        };
        text = text.replacen(&placeholder, &written, 1);
    }
    Ok(text)
}

fn payload_marker(index: usize) -> String {
    format!("ha_config_payload_{}_", index)
}

/// Payloads the emitter would quote only because they read as a number,
/// boolean or null. They are valid plain scalars and are written unquoted.
fn needs_verbatim_payload(payload: &str) -> bool {
    if payload.is_empty() {
        return true;
    }
    if payload.contains(|c: char| c.is_whitespace() || c == '#') {
        return false;
    }
    let digits = payload.strip_prefix(['-', '+']).unwrap_or(payload);
    if digits.len() > 1 && digits.starts_with('0') && digits.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    matches!(
        serde_yaml::from_str::<Value>(payload),
        Ok(Value::Null | Value::Bool(_) | Value::Number(_))
    )
}

/// YAML value in which every recognized tag carries its payload as the
/// scalar text found in the source
struct VerbatimTags(Value);

impl<'de> Deserialize<'de> for VerbatimTags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(VerbatimVisitor).map(VerbatimTags)
    }
}

struct VerbatimVisitor;

impl<'de> Visitor<'de> for VerbatimVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Number(i.into()))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        Ok(Value::Number(u.into()))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Number(f.into()))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_owned()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(VerbatimVisitor)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(VerbatimTags(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::new();
        while let Some((VerbatimTags(key), VerbatimTags(value))) = map.next_entry()? {
            if mapping.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate entry with key {:?}", key)));
            }
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }

    fn visit_enum<A>(self, data: A) -> Result<Value, A::Error>
    where
        A: EnumAccess<'de>,
    {
        let (tag, contents) = data.variant::<String>()?;
        let value = if tag.parse::<HaTag>().is_ok() {
            Value::String(contents.newtype_variant_seed(ScalarText { tag: &tag })?)
        } else {
            let VerbatimTags(value) = contents.newtype_variant()?;
            value
        };
        Ok(Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tag),
            value,
        })))
    }
}

/// Reads a scalar as written, without resolving it to a number or boolean
struct ScalarText<'a> {
    tag: &'a str,
}

impl<'de> DeserializeSeed<'de> for ScalarText<'_> {
    type Value = String;

    fn deserialize<D>(self, deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for ScalarText<'_> {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a scalar value for tag !{}", self.tag)
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<String, E> {
        Ok(s.to_owned())
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<String, E> {
        Ok(s)
    }
}

/// Convert a raw YAML value, capturing custom tags
fn from_yaml(value: Value) -> ConfigResult<ConfigValue> {
    Ok(match value {
        Value::Null => ConfigValue::Null,
        Value::Bool(b) => ConfigValue::Bool(b),
        Value::Number(n) => ConfigValue::Number(n),
        Value::String(s) => ConfigValue::String(s),
        Value::Sequence(seq) => ConfigValue::Sequence(
            seq.into_iter()
                .map(from_yaml)
                .collect::<ConfigResult<Vec<_>>>()?,
        ),
        Value::Mapping(map) => {
            let mut result = ConfigMap::with_capacity(map.len());
            for (k, v) in map {
                result.insert(key_from_yaml(k)?, from_yaml(v)?);
            }
            ConfigValue::Mapping(result)
        }
        Value::Tagged(tagged) => from_tagged(*tagged)?,
    })
}

fn from_tagged(tagged: TaggedValue) -> ConfigResult<ConfigValue> {
    let tag = tagged.tag.to_string();
    trace!("Parsing tag '{}' with value {:?}", tag, tagged.value);

    match (tag.parse::<HaTag>(), tagged.value) {
        (Ok(ha_tag), Value::String(payload)) => {
            Ok(ConfigValue::CustomTag(CustomTagValue::new(ha_tag, payload)))
        }
        (Ok(_), _) => Err(ConfigError::InvalidTagValue { tag }),
        (Err(()), value) => Ok(ConfigValue::Tagged(Box::new(TaggedNode {
            tag,
            value: from_yaml(value)?,
        }))),
    }
}

fn key_from_yaml(key: Value) -> ConfigResult<ConfigKey> {
    match key {
        Value::Null => Ok(ConfigKey::Null),
        Value::Bool(b) => Ok(ConfigKey::Bool(b)),
        Value::Number(n) => Ok(ConfigKey::Number(n)),
        Value::String(s) => Ok(ConfigKey::String(s)),
        other => Err(ConfigError::UnsupportedKey {
            key: format!("{:?}", other),
        }),
    }
}

fn to_yaml(value: &ConfigValue, verbatim: &mut Vec<CustomTagValue>) -> Value {
    match value {
        ConfigValue::Null => Value::Null,
        ConfigValue::Bool(b) => Value::Bool(*b),
        ConfigValue::Number(n) => Value::Number(n.clone()),
        ConfigValue::String(s) => Value::String(s.clone()),
        ConfigValue::Sequence(seq) => {
            Value::Sequence(seq.iter().map(|item| to_yaml(item, verbatim)).collect())
        }
        ConfigValue::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (key_to_yaml(k), to_yaml(v, verbatim)))
                .collect(),
        ),
        ConfigValue::CustomTag(custom) => {
            let payload = if needs_verbatim_payload(&custom.value) {
                verbatim.push(custom.clone());
                payload_marker(verbatim.len() - 1)
            } else {
                custom.value.clone()
            };
            Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(custom.tag.as_str()),
                value: Value::String(payload),
            }))
        }
        ConfigValue::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tagged.tag.as_str()),
            value: to_yaml(&tagged.value, verbatim),
        })),
    }
}

fn key_to_yaml(key: &ConfigKey) -> Value {
    match key {
        ConfigKey::Null => Value::Null,
        ConfigKey::Bool(b) => Value::Bool(*b),
        ConfigKey::Number(n) => Value::Number(n.clone()),
        ConfigKey::String(s) => Value::String(s.clone()),
    }
}
