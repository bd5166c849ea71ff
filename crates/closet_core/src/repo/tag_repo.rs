//! Tag vocabulary queries and maintenance.
//!
//! # Responsibility
//! - Look up tags by normalized name and enumerate the vocabulary.
//! - Project tags in use together with the images that reference them.
//! - Provide explicit tag removal; write paths never call it.
//!
//! # Invariants
//! - Tag listings are ordered by `name ASC`.
//! - "In use" means at least one `image_tags` row references the tag.
//! - The in-use projection is one joined statement, so every listed tag
//!   carries at least one image.

use crate::model::image::{Image, TagWithImages};
use crate::model::tag::{Tag, TagId};
use crate::repo::image_repo::SqliteCatalogRepository;
use crate::repo::RepoResult;
use rusqlite::OptionalExtension;

/// Repository interface for tag vocabulary operations.
pub trait TagRepository {
    /// Finds one tag by exact normalized name.
    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>>;
    /// Lists every tag row, including orphans.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Lists tags linked to at least one image, each with its images.
    fn list_tags_in_use(&self) -> RepoResult<Vec<TagWithImages>>;
    /// Deletes one tag and its links. Returns whether a row existed.
    fn delete_tag(&mut self, tag_id: TagId) -> RepoResult<bool>;
    /// Deletes every tag with no links. Returns the number removed.
    fn prune_orphan_tags(&mut self) -> RepoResult<usize>;
}

impl TagRepository for SqliteCatalogRepository<'_> {
    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT tag_id, name FROM tags WHERE name = ?1;",
                [name],
                |row| {
                    Ok(Tag {
                        tag_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(tag)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag_id, name FROM tags ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag {
                tag_id: row.get(0)?,
                name: row.get(1)?,
            });
        }
        Ok(tags)
    }

    fn list_tags_in_use(&self) -> RepoResult<Vec<TagWithImages>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.tag_id, t.name, i.image_id, i.file_path
             FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.tag_id
             INNER JOIN images i ON i.image_id = it.image_id
             ORDER BY t.name ASC, i.image_id DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags: Vec<TagWithImages> = Vec::new();
        while let Some(row) = rows.next()? {
            let tag_id: TagId = row.get(0)?;
            let image = Image {
                image_id: row.get(2)?,
                file_path: row.get(3)?,
            };
            let starts_new_tag = tags
                .last()
                .map_or(true, |current| current.tag.tag_id != tag_id);
            if starts_new_tag {
                tags.push(TagWithImages {
                    tag: Tag {
                        tag_id,
                        name: row.get(1)?,
                    },
                    images: Vec::new(),
                });
            }
            if let Some(current) = tags.last_mut() {
                current.images.push(image);
            }
        }
        Ok(tags)
    }

    fn delete_tag(&mut self, tag_id: TagId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM tags WHERE tag_id = ?1;", [tag_id])?;
        Ok(changed > 0)
    }

    fn prune_orphan_tags(&mut self) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM tags
             WHERE NOT EXISTS (SELECT 1 FROM image_tags it WHERE it.tag_id = tags.tag_id);",
            [],
        )?;
        Ok(removed)
    }
}
