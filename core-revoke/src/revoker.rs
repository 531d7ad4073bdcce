//! Permission Revoker
//!
//! Removes every non-owner grant from a single item: link sharing first, then
//! individual editors, then individual viewers. Each step runs even when an
//! earlier one failed, and each grantee is isolated so that one stale grant
//! never blocks the others.
//!
//! Two kinds of failure escape an item instead of being counted inside it: a
//! rejected credential, and an audit log that refuses a record. Either way
//! the item is abandoned part-way and [`ItemAborted`] carries what had already
//! been done to it.

use std::sync::Arc;

use bridge_traits::error::BridgeError;
use bridge_traits::sharing::{Grantee, GranteeRole, Item, SharingAccess, SharingApi};
use bridge_traits::storage::{AuditLog, ErrorRecord, RemovalRecord, RevocationKind};
use bridge_traits::time::Clock;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::caller::ApiCaller;
use crate::error::{Result, RevokeError};

pub const LINK_DISABLED_DETAIL: &str = "link sharing disabled";

/// Per-item result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevokeOutcome {
    pub removed: u64,
    pub errors: u64,
}

/// An item left unfinished.
///
/// Removals in `partial` really happened and are in the audit log, so they
/// must be counted even though the item itself is retried on resume.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct ItemAborted {
    pub partial: RevokeOutcome,
    #[source]
    pub cause: RevokeError,
}

pub struct Revoker {
    api: Arc<dyn SharingApi>,
    audit: Arc<dyn AuditLog>,
    caller: ApiCaller,
    clock: Arc<dyn Clock>,
}

impl Revoker {
    pub fn new(
        api: Arc<dyn SharingApi>,
        audit: Arc<dyn AuditLog>,
        caller: ApiCaller,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            audit,
            caller,
            clock,
        }
    }

    /// Strips all sharing from `item`.
    ///
    /// Remote failures are recorded in the audit log and counted in the
    /// outcome. If the initial sharing read fails the item counts as exactly
    /// one error.
    ///
    /// # Errors
    ///
    /// [`ItemAborted`] when the credential is rejected or the audit log fails.
    #[instrument(skip(self, item), fields(item_id = %item.id, item_name = %item.name))]
    pub async fn revoke(&self, item: &Item) -> std::result::Result<RevokeOutcome, ItemAborted> {
        let mut outcome = RevokeOutcome::default();
        if let Err(cause) = self.strip(item, &mut outcome).await {
            return Err(ItemAborted {
                partial: outcome,
                cause,
            });
        }

        debug!(
            removed = outcome.removed,
            errors = outcome.errors,
            "Item processed"
        );
        Ok(outcome)
    }

    async fn strip(&self, item: &Item, outcome: &mut RevokeOutcome) -> Result<()> {
        let access = match self
            .caller
            .call("get_sharing_access", || self.api.get_sharing_access(item))
            .await
        {
            Ok(access) => access,
            Err(e) => {
                let e = escalate(e)?;
                self.record_error(item, format!("Failed to read sharing access: {}", e))
                    .await?;
                outcome.errors = 1;
                return Ok(());
            }
        };

        if access.is_link_shared() {
            self.disable_link(item, access, outcome).await?;
        }

        self.remove_grantees(item, GranteeRole::Editor, outcome)
            .await?;
        self.remove_grantees(item, GranteeRole::Viewer, outcome)
            .await
    }

    async fn disable_link(
        &self,
        item: &Item,
        access: SharingAccess,
        outcome: &mut RevokeOutcome,
    ) -> Result<()> {
        let kind = match access {
            SharingAccess::Domain => RevocationKind::LinkDomain,
            _ => RevocationKind::LinkAnyone,
        };

        match self
            .caller
            .call("set_sharing_access", || {
                self.api.set_sharing_access(item, SharingAccess::Private)
            })
            .await
        {
            Ok(()) => {
                self.record_removal(item, kind, LINK_DISABLED_DETAIL.to_string())
                    .await?;
                outcome.removed += 1;
            }
            Err(e) => {
                let e = escalate(e)?;
                self.record_error(item, format!("Failed to disable link sharing: {}", e))
                    .await?;
                outcome.errors += 1;
            }
        }
        Ok(())
    }

    async fn remove_grantees(
        &self,
        item: &Item,
        role: GranteeRole,
        outcome: &mut RevokeOutcome,
    ) -> Result<()> {
        let (label, kind) = match role {
            GranteeRole::Editor => ("editors", RevocationKind::Editor),
            GranteeRole::Viewer => ("viewers", RevocationKind::Viewer),
        };

        let listed = match role {
            GranteeRole::Editor => {
                self.caller
                    .call("list_editors", || self.api.list_editors(item))
                    .await
            }
            GranteeRole::Viewer => {
                self.caller
                    .call("list_viewers", || self.api.list_viewers(item))
                    .await
            }
        };

        let grantees = match listed {
            Ok(grantees) => grantees,
            Err(e) => {
                let e = escalate(e)?;
                self.record_error(item, format!("Failed to list {}: {}", label, e))
                    .await?;
                outcome.errors += 1;
                return Ok(());
            }
        };

        for grantee in &grantees {
            match self.remove_grantee(item, grantee, role).await {
                Ok(()) => {
                    self.record_removal(item, kind, grantee.identity.clone())
                        .await?;
                    outcome.removed += 1;
                }
                Err(e) => {
                    let e = escalate(e)?;
                    self.record_error(
                        item,
                        format!("Failed to remove {} {}: {}", kind, grantee.identity, e),
                    )
                    .await?;
                    outcome.errors += 1;
                }
            }
        }
        Ok(())
    }

    async fn remove_grantee(
        &self,
        item: &Item,
        grantee: &Grantee,
        role: GranteeRole,
    ) -> bridge_traits::error::Result<()> {
        match role {
            GranteeRole::Editor => {
                self.caller
                    .call("remove_editor", || self.api.remove_editor(item, grantee))
                    .await
            }
            GranteeRole::Viewer => {
                self.caller
                    .call("remove_viewer", || self.api.remove_viewer(item, grantee))
                    .await
            }
        }
    }

    async fn record_removal(
        &self,
        item: &Item,
        kind: RevocationKind,
        detail: String,
    ) -> Result<()> {
        let record = RemovalRecord {
            timestamp: self.clock.now(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            kind,
            detail,
        };
        self.audit.append_removal(&record).await?;
        Ok(())
    }

    async fn record_error(&self, item: &Item, detail: String) -> Result<()> {
        warn!(item_id = %item.id, detail = %detail, "Revocation step failed");
        let record = ErrorRecord {
            timestamp: self.clock.now(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            detail,
        };
        self.audit.append_error(&record).await?;
        Ok(())
    }
}

/// Passes item-level failures back to the caller and turns fatal ones into
/// an error that abandons the item.
fn escalate(error: BridgeError) -> Result<BridgeError> {
    if error.is_fatal() {
        warn!(error = %error, "Credential rejected, abandoning item");
        return Err(RevokeError::Bridge(error));
    }
    Ok(error)
}
