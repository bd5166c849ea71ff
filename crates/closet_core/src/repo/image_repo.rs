//! Image repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist image rows and own tag-link replacement (`replace_image_tags`).
//! - Load images joined with their tag sets.
//!
//! # Invariants
//! - Image lists are ordered by `image_id DESC` (newest first).
//! - Every read is a single statement, so a concurrent delete never yields a
//!   half-joined image.
//! - Tag replacement is a full replace inside one `IMMEDIATE` transaction.
//! - Tags are resolved by lookup-before-insert on the normalized name; the
//!   schema's `UNIQUE(name)` backs that up.
//! - Link inserts ignore duplicate `(image_id, tag_id)` pairs.

use crate::model::image::{Image, ImageId, ImageWithTags};
use crate::model::tag::{Tag, TagId};
use crate::repo::{ensure_catalog_schema, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Rows, TransactionBehavior};

/// Images left-joined with their tags; one row per link, or one row with
/// NULL tag columns for an untagged image. A single statement reads one
/// consistent snapshot even while other connections write.
const IMAGES_WITH_TAGS_SELECT: &str = "SELECT i.image_id, i.file_path, t.tag_id, t.name
     FROM images i
     LEFT JOIN image_tags it ON it.image_id = i.image_id
     LEFT JOIN tags t ON t.tag_id = it.tag_id";

/// Repository interface for image rows and their tag links.
pub trait ImageRepository {
    /// Inserts one image row and links `tags` to it in one transaction.
    ///
    /// `tags` must already be normalized.
    fn insert_image_with_tags(&mut self, file_path: &str, tags: &[String]) -> RepoResult<ImageId>;
    /// Replaces the full tag set of one image.
    fn replace_image_tags(&mut self, image_id: ImageId, tags: &[String]) -> RepoResult<()>;
    /// Gets one image with its tags.
    fn get_image(&self, image_id: ImageId) -> RepoResult<Option<ImageWithTags>>;
    /// Lists every image with its tags, newest first.
    fn list_images(&self) -> RepoResult<Vec<ImageWithTags>>;
    /// Deletes the image row and its links. Returns whether a row existed.
    fn delete_image(&mut self, image_id: ImageId) -> RepoResult<bool>;
    /// Lists the stored file path of every image.
    fn list_file_paths(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed catalog repository (images, tags and links).
pub struct SqliteCatalogRepository<'conn> {
    pub(crate) conn: &'conn mut Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_catalog_schema(conn)?;
        Ok(Self { conn })
    }
}

impl ImageRepository for SqliteCatalogRepository<'_> {
    fn insert_image_with_tags(&mut self, file_path: &str, tags: &[String]) -> RepoResult<ImageId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO images (file_path) VALUES (?1);",
            [file_path],
        )?;
        let image_id = tx.last_insert_rowid();
        link_tags(&tx, image_id, tags)?;
        tx.commit()?;
        Ok(image_id)
    }

    fn replace_image_tags(&mut self, image_id: ImageId, tags: &[String]) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !image_exists(&tx, image_id)? {
            return Err(RepoError::NotFound(image_id));
        }

        tx.execute("DELETE FROM image_tags WHERE image_id = ?1;", [image_id])?;
        link_tags(&tx, image_id, tags)?;
        tx.commit()?;
        Ok(())
    }

    fn get_image(&self, image_id: ImageId) -> RepoResult<Option<ImageWithTags>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IMAGES_WITH_TAGS_SELECT} WHERE i.image_id = ?1 ORDER BY t.name ASC;"
        ))?;
        let images = collect_images(stmt.query([image_id])?)?;
        Ok(images.into_iter().next())
    }

    fn list_images(&self) -> RepoResult<Vec<ImageWithTags>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IMAGES_WITH_TAGS_SELECT} ORDER BY i.image_id DESC, t.name ASC;"
        ))?;
        let images = collect_images(stmt.query([])?);
        images
    }

    fn delete_image(&mut self, image_id: ImageId) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM image_tags WHERE image_id = ?1;", [image_id])?;
        let changed = tx.execute("DELETE FROM images WHERE image_id = ?1;", [image_id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn list_file_paths(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT file_path FROM images;")?;
        let mut rows = stmt.query([])?;
        let mut paths = Vec::new();
        while let Some(row) = rows.next()? {
            paths.push(row.get(0)?);
        }
        Ok(paths)
    }
}

/// Links normalized tag names to an image, creating missing tags.
fn link_tags(conn: &Connection, image_id: ImageId, tags: &[String]) -> RepoResult<()> {
    for name in tags {
        let tag_id = match find_tag_id(conn, name)? {
            Some(tag_id) => tag_id,
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1);", [name.as_str()])?;
                conn.last_insert_rowid()
            }
        };
        conn.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2);",
            params![image_id, tag_id],
        )?;
    }
    Ok(())
}

fn find_tag_id(conn: &Connection, name: &str) -> RepoResult<Option<TagId>> {
    let tag_id = conn
        .query_row("SELECT tag_id FROM tags WHERE name = ?1;", [name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(tag_id)
}

fn image_exists(conn: &Connection, image_id: ImageId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM images WHERE image_id = ?1);",
        [image_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Groups consecutive `IMAGES_WITH_TAGS_SELECT` rows by image.
fn collect_images(mut rows: Rows<'_>) -> RepoResult<Vec<ImageWithTags>> {
    let mut images: Vec<ImageWithTags> = Vec::new();
    while let Some(row) = rows.next()? {
        let image_id: ImageId = row.get(0)?;
        let tag_id: Option<TagId> = row.get(2)?;
        let tag_name: Option<String> = row.get(3)?;

        let is_new_image = images
            .last()
            .map_or(true, |current| current.image.image_id != image_id);
        if is_new_image {
            images.push(ImageWithTags {
                image: Image {
                    image_id,
                    file_path: row.get(1)?,
                },
                tags: Vec::new(),
            });
        }

        if let (Some(tag_id), Some(name), Some(current)) = (tag_id, tag_name, images.last_mut()) {
            current.tags.push(Tag { tag_id, name });
        }
    }
    Ok(images)
}
