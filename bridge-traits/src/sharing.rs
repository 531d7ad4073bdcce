//! Item Enumeration and Sharing Mutation
//!
//! The revocation engine sees a storage account through two capabilities:
//! - [`ItemSource`] yields items page by page from an opaque page token.
//! - [`SharingApi`] reads and mutates the sharing state of one item.
//!
//! Both are remote in practice, so every method is fallible and async. Callers
//! are expected to wrap each call in their own retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Which half of the account a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file or folder as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Token for the following page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Link-level access of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharingAccess {
    /// Only the owner and explicitly listed grantees.
    Private,
    /// Anyone in the owner's domain who has the link.
    Domain,
    /// Anyone on the internet who has the link.
    AnyoneWithLink,
}

impl SharingAccess {
    pub fn is_link_shared(&self) -> bool {
        !matches!(self, SharingAccess::Private)
    }
}

/// Role of an individually listed grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranteeRole {
    Editor,
    Viewer,
}

/// A user or group with explicit access to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grantee {
    /// Provider-side identifier used for removal.
    pub id: String,
    /// Email or equivalent display identity.
    pub identity: String,
    pub role: GranteeRole,
}

/// Paginated item listing.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch the page identified by `page_token`, or the first page when `None`.
    ///
    /// Any token previously returned as `next_page_token` must stay valid for
    /// resumption across process restarts for a reasonable period.
    async fn fetch_page(&self, kind: ItemKind, page_token: Option<&str>) -> Result<ItemPage>;
}

/// Sharing inspection and mutation for single items.
///
/// The owner of an item is never returned by `list_editors`/`list_viewers`.
#[async_trait]
pub trait SharingApi: Send + Sync {
    /// Identity of the account owner whose items are processed.
    async fn owner_identity(&self) -> Result<String>;

    async fn get_sharing_access(&self, item: &Item) -> Result<SharingAccess>;

    async fn set_sharing_access(&self, item: &Item, access: SharingAccess) -> Result<()>;

    async fn list_editors(&self, item: &Item) -> Result<Vec<Grantee>>;

    async fn remove_editor(&self, item: &Item, grantee: &Grantee) -> Result<()>;

    async fn list_viewers(&self, item: &Item) -> Result<Vec<Grantee>>;

    async fn remove_viewer(&self, item: &Item, grantee: &Grantee) -> Result<()>;
}
