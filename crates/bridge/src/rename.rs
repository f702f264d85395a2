use std::sync::Arc;

use tracing::debug;

use store::prelude::{NodeKind, StoreError};

use crate::error::{BridgeError, Errno};
use crate::resolve::PathResolver;
use crate::stat::node_kind;

/// Implements the overwrite policy for moving a node to a new path.
///
/// Overwriting an existing target takes two backend calls (delete,
/// then move); the window between them is an accepted weak consistency
/// point, since the backend offers no atomic replace.
#[derive(Clone)]
pub struct RenameCoordinator {
    resolver: Arc<PathResolver>,
}

impl RenameCoordinator {
    pub fn new(resolver: Arc<PathResolver>) -> Self {
        Self { resolver }
    }

    pub async fn rename(&self, base: &str, path: &str, newpath: &str) -> Result<(), BridgeError> {
        let repo = self.resolver.repo().clone();
        let source = self.resolver.require(base, path).await?;
        let target = self.resolver.resolve(base, newpath).await?;

        let (target_parent_path, target_name) = PathResolver::split_parent(newpath)
            .ok_or_else(|| BridgeError::bad_input("cannot rename onto the base"))?;
        let (source_parent_path, _) = PathResolver::split_parent(path)
            .ok_or_else(|| BridgeError::bad_input("cannot rename the base"))?;

        // the target's parent must pre-exist; it is never auto-created
        let target_parent = self
            .resolver
            .resolve(base, &target_parent_path)
            .await?
            .ok_or_else(|| {
                BridgeError::not_found(format!("no such directory: {target_parent_path}"))
            })?;
        let source_parent = self
            .resolver
            .require(base, &source_parent_path)
            .await?;

        let source_kind = node_kind(repo.as_ref(), source).await?;

        let _txn = repo.begin().await;
        if let Some(target) = target {
            let target_kind = node_kind(repo.as_ref(), target).await?;
            match (source_kind, target_kind) {
                (NodeKind::Directory, NodeKind::Directory) => {
                    // emptiness here is direct children only
                    if repo.count_children(target, false).await? > 0 {
                        return Err(BridgeError::errno(
                            Errno::ENOTEMPTY,
                            format!("directory not empty: {newpath}"),
                        ));
                    }
                    debug!(%target, "replacing empty target directory");
                    repo.delete_node(target).await?;
                }
                (NodeKind::Directory, _) => {
                    return Err(BridgeError::errno(
                        Errno::ENOTDIR,
                        format!("not a directory: {newpath}"),
                    ))
                }
                (NodeKind::File | NodeKind::Link, NodeKind::Directory) => {
                    return Err(BridgeError::errno(
                        Errno::EISDIR,
                        format!("is a directory: {newpath}"),
                    ))
                }
                (NodeKind::File | NodeKind::Link, _) => {
                    debug!(%target, "replacing target file");
                    repo.delete_node(target).await?;
                }
            }
        }

        // same-directory rename passes no new parent
        let new_parent = if source_parent == target_parent {
            None
        } else {
            Some(target_parent)
        };
        repo.move_node(source, new_parent, &target_name)
            .await
            .map_err(|err| match err {
                StoreError::NameExists(name) => BridgeError::errno(
                    Errno::EEXIST,
                    format!("target already exists: {name}"),
                ),
                StoreError::NodeNotFound(_) => {
                    BridgeError::not_found(format!("path vanished during rename: {path}"))
                }
                other => other.into(),
            })
    }
}
