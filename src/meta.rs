//! Lazily loaded database → table → column tree for a datasource.

use serde::Serialize;
use tracing::debug;

use crate::models::MetaParams;
use crate::transport::MetaTransport;
use crate::{DashQueryError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    Database,
    Table { db: String },
    Column { db: String, table: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaNode {
    pub title: String,
    pub key: String,
    /// `None` until the node has been expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MetaNode>>,
    pub is_leaf: bool,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl MetaNode {
    fn database(name: String) -> Self {
        Self {
            title: name.clone(),
            key: name,
            children: None,
            is_leaf: false,
            kind: NodeKind::Database,
        }
    }

    fn table(db: &str, name: String) -> Self {
        Self {
            key: format!("{}.{}", db, name),
            title: name,
            children: None,
            is_leaf: false,
            kind: NodeKind::Table { db: db.to_string() },
        }
    }

    fn column(db: &str, table: &str, name: &str, data_type: &str) -> Self {
        Self {
            title: format!("{} ({})", name, data_type),
            key: format!("{}.{}.{}", db, table, name),
            children: None,
            is_leaf: true,
            kind: NodeKind::Column {
                db: db.to_string(),
                table: table.to_string(),
            },
        }
    }
}

/// Returns a copy of `list` where the node with `key` has `children` attached.
pub fn update_tree_data(list: &[MetaNode], key: &str, children: Vec<MetaNode>) -> Vec<MetaNode> {
    replace_children(list, key, &Some(children))
}

fn replace_children(list: &[MetaNode], key: &str, children: &Option<Vec<MetaNode>>) -> Vec<MetaNode> {
    list.iter()
        .map(|node| {
            if node.key == key {
                MetaNode {
                    children: children.clone(),
                    ..node.clone()
                }
            } else if let Some(existing) = &node.children {
                MetaNode {
                    children: Some(replace_children(existing, key, children)),
                    ..node.clone()
                }
            } else {
                node.clone()
            }
        })
        .collect()
}

pub fn find_node<'a>(list: &'a [MetaNode], key: &str) -> Option<&'a MetaNode> {
    list.iter().find_map(|node| {
        if node.key == key {
            Some(node)
        } else {
            node.children.as_deref().and_then(|children| find_node(children, key))
        }
    })
}

pub struct MetaBrowser<T> {
    transport: T,
    datasource_id: i64,
    is_stable: bool,
    tree: Vec<MetaNode>,
}

impl<T: MetaTransport> MetaBrowser<T> {
    pub fn new(transport: T, datasource_id: i64) -> Self {
        Self {
            transport,
            datasource_id,
            is_stable: false,
            tree: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn tree(&self) -> &[MetaNode] {
        &self.tree
    }

    /// Whether tables are listed as super tables.
    pub fn is_stable(&self) -> bool {
        self.is_stable
    }

    fn base_params(&self) -> MetaParams {
        MetaParams::new(self.datasource_id)
    }

    /// Replaces the tree with the datasource's databases.
    pub async fn load_roots(&mut self) -> Result<&[MetaNode]> {
        let databases = self.transport.list_databases(&self.base_params()).await?;
        debug!(
            "Loaded {} databases for datasource {}",
            databases.len(),
            self.datasource_id
        );
        self.tree = databases.into_iter().map(MetaNode::database).collect();
        Ok(&self.tree)
    }

    /// Switches between normal and super tables; the tree restarts from its roots.
    pub async fn set_stable(&mut self, is_stable: bool) -> Result<()> {
        if self.is_stable == is_stable && !self.tree.is_empty() {
            return Ok(());
        }
        self.is_stable = is_stable;
        self.load_roots().await?;
        Ok(())
    }

    /// Loads the children of `key` unless they are already present.
    pub async fn expand(&mut self, key: &str) -> Result<()> {
        let node = find_node(&self.tree, key)
            .ok_or_else(|| DashQueryError::NotFound(format!("Tree node {} not found", key)))?;
        if node.is_leaf || node.children.is_some() {
            return Ok(());
        }

        let children = match node.kind.clone() {
            NodeKind::Database => {
                let db = node.title.clone();
                let params = MetaParams {
                    db: Some(db.clone()),
                    is_stable: Some(self.is_stable),
                    ..self.base_params()
                };
                self.transport
                    .list_tables(&params)
                    .await?
                    .into_iter()
                    .map(|table| MetaNode::table(&db, table))
                    .collect()
            }
            NodeKind::Table { db } => {
                let table = node.title.clone();
                let params = MetaParams {
                    db: Some(db.clone()),
                    table: Some(table.clone()),
                    ..self.base_params()
                };
                self.transport
                    .list_columns(&params)
                    .await?
                    .iter()
                    .map(|col| MetaNode::column(&db, &table, &col.name, &col.data_type))
                    .collect()
            }
            NodeKind::Column { .. } => return Ok(()),
        };

        self.tree = update_tree_data(&self.tree, key, children);
        Ok(())
    }

    /// Drops the loaded children of `key`; the next `expand` fetches them again.
    pub fn collapse(&mut self, key: &str) -> bool {
        if find_node(&self.tree, key).is_none() {
            return false;
        }
        self.tree = replace_children(&self.tree, key, &None);
        true
    }
}
