use crate::{
    config::{AppConfig, DEFAULT_DELIMITER, DEFAULT_MAX_DEPTH},
    error::{CategoryError, Result},
    models::{CategoryNode, NewCategory, UpdateCategoryRequest},
    repository::RepositoryState,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Longest accepted segment name, in characters.
pub const MAX_NAME_LEN: usize = 248;

/// Longest accepted materialized path, in characters.
pub const MAX_PATH_LEN: usize = 1016;

/// CategoryManager
///
/// Maintains the category forest: every node's `path` and `level` are derived from its
/// ancestor chain and kept consistent on each write. The manager holds no state beyond its
/// injected repository and settings.
///
/// Concurrent creation of the same path by two callers is not coordinated here. The store's
/// (name, parent, level) uniqueness turns the losing insert into `CategoryError::Conflict`.
#[derive(Clone)]
pub struct CategoryManager {
    repo: RepositoryState,
    delimiter: char,
    max_depth: usize,
}

impl CategoryManager {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            repo,
            delimiter: DEFAULT_DELIMITER,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn from_config(repo: RepositoryState, config: &AppConfig) -> Self {
        Self {
            repo,
            delimiter: config.category_delimiter,
            max_depth: config.category_max_depth,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    // --- Tree Construction & Rollback ---

    /// create_category_tree
    ///
    /// Gets or creates each segment of `names` (root first), creating missing ancestors as
    /// needed, and returns the nodes in the same order. Running it twice with the same names
    /// returns the same nodes.
    ///
    /// Every name is trimmed and validated before the first lookup, so an invalid name leaves
    /// the store untouched.
    pub async fn create_category_tree(
        &self,
        names: &[String],
        actor: Uuid,
    ) -> Result<Vec<CategoryNode>> {
        let names = names
            .iter()
            .map(|name| self.clean_name(name))
            .collect::<Result<Vec<String>>>()?;
        if names.len() > self.max_depth + 1 {
            return Err(CategoryError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        let full_path = names.join(&self.delimiter.to_string());
        check_path_len(&full_path)?;

        let mut nodes: Vec<CategoryNode> = Vec::with_capacity(names.len());

        for (level, name) in names.iter().enumerate() {
            let parent = nodes.last();
            let parent_id = parent.map(|p| p.id);
            let level = level as i32;

            let node = match self.repo.find_category(name, parent_id, level).await? {
                Some(existing) => existing,
                None => {
                    let path = match parent {
                        Some(p) => self.join(&p.path, name),
                        None => name.clone(),
                    };
                    let created = self
                        .repo
                        .insert_category(NewCategory {
                            name: name.clone(),
                            parent_id,
                            path,
                            level,
                            owner_id: actor,
                            creator_id: actor,
                            updater_id: actor,
                        })
                        .await?;
                    tracing::debug!(path = %created.path, "created category");
                    created
                }
            };
            nodes.push(node);
        }

        tracing::info!(path = %full_path, actor = %actor, "category tree ensured");
        Ok(nodes)
    }

    /// delete_category_tree
    ///
    /// Undoes a prior `create_category_tree`: walks `nodes` leaf first and deletes each node
    /// until one still has children, which stops the walk. Returns the deleted paths in
    /// deletion order. Nodes already gone are skipped.
    pub async fn delete_category_tree(&self, nodes: &[CategoryNode]) -> Result<Vec<String>> {
        let mut deleted = Vec::new();

        for node in nodes.iter().rev() {
            if self.repo.has_children(node.id).await? {
                tracing::info!(path = %node.path, "stopping tree deletion at category with children");
                break;
            }
            match self.repo.delete_category(node.id).await {
                Ok(true) => deleted.push(node.path.clone()),
                Ok(false) => {}
                // A child was attached after the check above.
                Err(CategoryError::HasChildren(_)) => {
                    tracing::info!(path = %node.path, "stopping tree deletion at category with children");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(count = deleted.len(), "category tree deleted");
        Ok(deleted)
    }

    // --- Traversal ---

    /// get_parents
    ///
    /// The ancestors of `node`, root first, excluding `node` itself.
    ///
    /// Walks the parent chain iteratively. Fails with `DepthExceeded` once more than
    /// `max_depth` ancestors are visited and with `CorruptTree` on a cycle or a parent id that
    /// does not resolve.
    pub async fn get_parents(&self, node: &CategoryNode) -> Result<Vec<CategoryNode>> {
        let mut parents = Vec::new();
        let mut seen = HashSet::from([node.id]);
        let mut next = node.parent_id;

        while let Some(parent_id) = next {
            if parents.len() >= self.max_depth {
                return Err(CategoryError::DepthExceeded {
                    limit: self.max_depth,
                });
            }
            if !seen.insert(parent_id) {
                return Err(CategoryError::CorruptTree(parent_id));
            }
            let parent = self
                .repo
                .get_category(parent_id)
                .await?
                .ok_or(CategoryError::CorruptTree(parent_id))?;
            next = parent.parent_id;
            parents.push(parent);
        }

        parents.reverse();
        Ok(parents)
    }

    /// Every descendant of `node`, sorted case-insensitively by path.
    pub async fn get_children(&self, node: &CategoryNode) -> Result<Vec<CategoryNode>> {
        self.descendants(node, false).await
    }

    /// Like `get_children`, with `node` itself included.
    pub async fn get_children_and_root(&self, node: &CategoryNode) -> Result<Vec<CategoryNode>> {
        self.descendants(node, true).await
    }

    /// get_child_tree_from_list
    ///
    /// One sorted descendant list per input node. Lists with identical members are kept once,
    /// so passing a node twice (or two nodes with the same subtree) yields a single entry.
    pub async fn get_child_tree_from_list(
        &self,
        nodes: &[CategoryNode],
        with_root: bool,
    ) -> Result<Vec<Vec<CategoryNode>>> {
        let mut trees: Vec<Vec<CategoryNode>> = Vec::new();
        let mut seen: HashSet<Vec<Uuid>> = HashSet::new();

        for node in nodes {
            let tree = self.descendants(node, with_root).await?;
            let key: Vec<Uuid> = tree.iter().map(|c| c.id).collect();
            if seen.insert(key) {
                trees.push(tree);
            }
        }

        Ok(trees)
    }

    /// get_all_root_trees
    ///
    /// For every node called `name`, its ancestor chain as returned by `get_parents`.
    /// Answers "where in the forest does this name occur".
    pub async fn get_all_root_trees(&self, name: &str) -> Result<Vec<Vec<CategoryNode>>> {
        let matches = self.repo.find_categories_by_name(name).await?;
        let mut chains = Vec::with_capacity(matches.len());
        for node in &matches {
            chains.push(self.get_parents(node).await?);
        }
        Ok(chains)
    }

    /// The path of `node` without its own segment; empty for a root.
    pub async fn parent_path(&self, node: &CategoryNode) -> Result<String> {
        let parents = self.get_parents(node).await?;
        Ok(self.join_names(parents.iter().map(|p| p.name.as_str())))
    }

    async fn descendants(&self, node: &CategoryNode, with_root: bool) -> Result<Vec<CategoryNode>> {
        let mut seen = HashSet::from([node.id]);
        let mut found = Vec::new();
        if with_root {
            found.push(node.clone());
        }

        let mut stack = vec![(node.id, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            for child in self.repo.children(id).await? {
                // A node reachable twice is reported once.
                if !seen.insert(child.id) {
                    continue;
                }
                if depth + 1 > self.max_depth {
                    return Err(CategoryError::DepthExceeded {
                        limit: self.max_depth,
                    });
                }
                stack.push((child.id, depth + 1));
                found.push(child);
            }
        }

        found.sort_by_cached_key(|c| c.path.to_lowercase());
        Ok(found)
    }

    // --- Save & Cascade ---

    /// save
    ///
    /// Recomputes `path` and `level` of `node` from its current parent chain, persists it,
    /// then recomputes and persists every descendant depth first. Returns once the whole
    /// subtree is consistent.
    pub async fn save(&self, mut node: CategoryNode) -> Result<CategoryNode> {
        let parents = self.get_parents(&node).await?;
        node.path = self.join_names(
            parents
                .iter()
                .map(|p| p.name.as_str())
                .chain(std::iter::once(node.name.as_str())),
        );
        check_path_len(&node.path)?;
        node.level = self.level_of(&node.path);

        let saved = self.repo.save_category(&node).await?;
        self.cascade(&saved).await?;
        Ok(saved)
    }

    async fn cascade(&self, root: &CategoryNode) -> Result<()> {
        let mut seen = HashSet::from([root.id]);
        let mut stack = vec![(root.clone(), 0usize)];

        while let Some((parent, depth)) = stack.pop() {
            for mut child in self.repo.children(parent.id).await? {
                if !seen.insert(child.id) {
                    return Err(CategoryError::CorruptTree(child.id));
                }
                if depth + 1 > self.max_depth {
                    return Err(CategoryError::DepthExceeded {
                        limit: self.max_depth,
                    });
                }
                child.path = self.join(&parent.path, &child.name);
                check_path_len(&child.path)?;
                child.level = self.level_of(&child.path);

                let saved = self.repo.save_category(&child).await?;
                tracing::debug!(path = %saved.path, "recomputed descendant path");
                stack.push((saved, depth + 1));
            }
        }

        Ok(())
    }

    // --- Single-Node Operations ---

    pub async fn get_category(&self, id: Uuid) -> Result<CategoryNode> {
        self.repo
            .get_category(id)
            .await?
            .ok_or(CategoryError::NotFound(id))
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryNode>> {
        self.repo.list_categories().await
    }

    /// create_category
    ///
    /// Creates one node under `parent_id` (or as a root). The parent must exist.
    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        owner_id: Uuid,
        actor: Uuid,
    ) -> Result<CategoryNode> {
        let name = self.clean_name(name)?;

        let (path, level) = match parent_id {
            Some(pid) => {
                let parent = self
                    .repo
                    .get_category(pid)
                    .await?
                    .ok_or(CategoryError::ParentNotFound(pid))?;
                let path = self.join(&parent.path, &name);
                (path, parent.level + 1)
            }
            None => (name.clone(), 0),
        };
        check_path_len(&path)?;
        if level as usize > self.max_depth {
            return Err(CategoryError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        let created = self
            .repo
            .insert_category(NewCategory {
                name,
                parent_id,
                path,
                level,
                owner_id,
                creator_id: actor,
                updater_id: actor,
            })
            .await?;
        tracing::info!(path = %created.path, actor = %actor, "category created");
        Ok(created)
    }

    /// update_category
    ///
    /// Renames, re-parents, or re-owns a node, stamps `actor` as updater and cascades the new
    /// path to the whole subtree. Moving a node under itself or one of its descendants is
    /// rejected, as is a move that would push any descendant past the path length limit or
    /// the depth limit.
    pub async fn update_category(
        &self,
        id: Uuid,
        changes: UpdateCategoryRequest,
        actor: Uuid,
    ) -> Result<CategoryNode> {
        let mut node = self.get_category(id).await?;
        let old_path_len = node.path.chars().count();
        let old_level = node.level;

        if let Some(name) = changes.name {
            node.name = self.clean_name(&name)?;
        }

        if changes.make_root {
            node.parent_id = None;
        } else if let Some(parent_id) = changes.parent_id {
            if parent_id == id {
                return Err(CategoryError::InvalidMove { id, parent_id });
            }
            let parent = self
                .repo
                .get_category(parent_id)
                .await?
                .ok_or(CategoryError::ParentNotFound(parent_id))?;
            let ancestors = self.get_parents(&parent).await?;
            if ancestors.iter().any(|a| a.id == id) {
                tracing::warn!(%id, %parent_id, "rejected move of category under its own subtree");
                return Err(CategoryError::InvalidMove { id, parent_id });
            }
            node.parent_id = Some(parent_id);
        }

        if let Some(owner_id) = changes.owner_id {
            node.owner_id = owner_id;
        }
        node.updater_id = actor;

        // Reject before writing anything if a descendant would outgrow the path or depth limit.
        let parents = self.get_parents(&node).await?;
        let new_path = self.join_names(
            parents
                .iter()
                .map(|p| p.name.as_str())
                .chain(std::iter::once(node.name.as_str())),
        );
        let new_path_len = new_path.chars().count();
        let new_level = parents.len() as i64;
        check_path_len(&new_path)?;
        if new_level > self.max_depth as i64 {
            return Err(CategoryError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        if new_path_len > old_path_len || new_level > old_level as i64 {
            let growth = new_path_len.saturating_sub(old_path_len);
            for descendant in self.get_children(&node).await? {
                let len = descendant.path.chars().count() + growth;
                if len > MAX_PATH_LEN {
                    return Err(CategoryError::PathTooLong {
                        len,
                        limit: MAX_PATH_LEN,
                    });
                }
                let level = new_level + (descendant.level - old_level) as i64;
                if level > self.max_depth as i64 {
                    tracing::warn!(%id, path = %descendant.path, "rejected move past depth limit");
                    return Err(CategoryError::DepthExceeded {
                        limit: self.max_depth,
                    });
                }
            }
        }

        let saved = self.save(node).await?;
        tracing::info!(path = %saved.path, actor = %actor, "category updated");
        Ok(saved)
    }

    /// delete_category
    ///
    /// Deletes a single childless node and returns its path.
    pub async fn delete_category(&self, id: Uuid) -> Result<String> {
        let node = self.get_category(id).await?;
        if self.repo.has_children(id).await? {
            return Err(CategoryError::HasChildren(id));
        }
        if !self.repo.delete_category(id).await? {
            return Err(CategoryError::NotFound(id));
        }
        tracing::info!(path = %node.path, "category deleted");
        Ok(node.path)
    }

    // --- Helpers ---

    /// clean_name
    ///
    /// Trims surrounding whitespace and returns the name that gets stored. The trimmed name
    /// must be non-empty, free of the delimiter, and at most `MAX_NAME_LEN` characters long.
    pub fn clean_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryError::invalid_name(name, "name must not be empty"));
        }
        if name.contains(self.delimiter) {
            return Err(CategoryError::invalid_name(
                name,
                format!("a category name cannot contain the category delimiter '{}'", self.delimiter),
            ));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(CategoryError::invalid_name(
                name,
                format!("name is longer than {} characters", MAX_NAME_LEN),
            ));
        }
        Ok(name.to_string())
    }

    fn join(&self, parent_path: &str, name: &str) -> String {
        format!("{}{}{}", parent_path, self.delimiter, name)
    }

    fn join_names<'a>(&self, names: impl Iterator<Item = &'a str>) -> String {
        names.collect::<Vec<_>>().join(&self.delimiter.to_string())
    }

    fn level_of(&self, path: &str) -> i32 {
        path.matches(self.delimiter).count() as i32
    }
}

fn check_path_len(path: &str) -> Result<()> {
    let len = path.chars().count();
    if len > MAX_PATH_LEN {
        return Err(CategoryError::PathTooLong {
            len,
            limit: MAX_PATH_LEN,
        });
    }
    Ok(())
}
