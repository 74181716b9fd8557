//! Wire shapes spoken with the remote compute service.

use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::domain::ParameterSet;

pub const DOUBLE_TYPE: &str = "System.Double";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub data: String,
}

impl DataItem {
    pub fn number(value: f64) -> Self {
        Self {
            kind: Some(DOUBLE_TYPE.to_string()),
            data: value.to_string(),
        }
    }
}

/// Branch path → items, kept in the order the peer sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTree {
    branches: Vec<(String, Vec<DataItem>)>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `items` to the branch at `path`, creating it if needed.
    pub fn append(&mut self, path: &[u32], items: impl IntoIterator<Item = DataItem>) {
        let key = format_path(path);
        match self.branches.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.extend(items),
            None => self.branches.push((key, items.into_iter().collect())),
        }
    }

    pub fn branches(&self) -> impl Iterator<Item = (&str, &[DataItem])> {
        self.branches
            .iter()
            .map(|(path, items)| (path.as_str(), items.as_slice()))
    }

    pub fn item_count(&self) -> usize {
        self.branches.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

fn format_path(path: &[u32]) -> String {
    let joined = path
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("{{{joined}}}")
}

impl Serialize for DataTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.branches.len()))?;
        for (path, items) in &self.branches {
            map.serialize_entry(path, items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DataTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TreeVisitor;

        impl<'de> Visitor<'de> for TreeVisitor {
            type Value = DataTree;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of branch paths to item lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DataTree, A::Error> {
                let mut branches = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((path, items)) = access.next_entry::<String, Vec<DataItem>>()? {
                    branches.push((path, items));
                }
                Ok(DataTree { branches })
            }
        }

        deserializer.deserialize_map(TreeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTree {
    #[serde(rename = "ParamName")]
    pub param_name: String,
    #[serde(rename = "InnerTree", default)]
    pub inner_tree: DataTree,
}

impl ParamTree {
    /// A tree holding one number at the root branch.
    pub fn single_number(param_name: impl Into<String>, value: f64) -> Self {
        let mut inner_tree = DataTree::new();
        inner_tree.append(&[0], [DataItem::number(value)]);
        Self {
            param_name: param_name.into(),
            inner_tree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    /// Base64 of the definition bytes.
    pub algo: Option<String>,
    pub pointer: Option<String>,
    pub values: Vec<ParamTree>,
}

impl ComputeRequest {
    pub fn input_trees(parameters: &ParameterSet) -> Vec<ParamTree> {
        parameters
            .named_values()
            .into_iter()
            .map(|(name, value)| ParamTree::single_number(name, value))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeResponse {
    #[serde(default)]
    pub values: Vec<ParamTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ComputeResponse {
    pub fn item_count(&self) -> usize {
        self.values.iter().map(|tree| tree.inner_tree.item_count()).sum()
    }
}
