//! Google Drive API connector implementation
//!
//! Implements `ItemSource` and `SharingApi` for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::sharing::{
    Grantee, GranteeRole, Item, ItemKind, ItemPage, ItemSource, SharingAccess, SharingApi,
};
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::error::{GoogleDriveError, Result};
use crate::types::{
    AboutResponse, ApiErrorResponse, FilesListResponse, Permission, PermissionsListResponse,
    FOLDER_MIME_TYPE,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

const DEFAULT_PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FILE_LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";

const PERMISSION_LIST_FIELDS: &str = "nextPageToken,permissions(id,type,role,emailAddress,domain)";

const EDITOR_ROLES: &[&str] = &["writer", "fileOrganizer", "organizer"];

const VIEWER_ROLES: &[&str] = &["reader", "commenter"];

/// What a 404 on a request refers to.
enum NotFound<'a> {
    File(&'a str),
    Permission {
        file_id: &'a str,
        permission_id: &'a str,
    },
    Nothing,
}

/// Google Drive API connector
///
/// Every method performs single HTTP attempts and classifies failures into
/// [`GoogleDriveError`]; retry and pacing are the caller's concern.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::sharing::{ItemKind, ItemSource};
///
/// let connector = GoogleDriveConnector::new(http_client, access_token);
/// let page = connector.fetch_page(ItemKind::File, None).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token with the `drive` scope
    access_token: String,

    page_size: u32,

    /// Owner email, resolved once through `about.get`
    owner_email: OnceCell<String>,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            page_size: DEFAULT_PAGE_SIZE,
            owner_email: OnceCell::new(),
        }
    }

    /// Set the listing page size, clamped to what Drive accepts.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", DRIVE_API_BASE, path))
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    fn listing_query(kind: ItemKind) -> String {
        let op = match kind {
            ItemKind::File => "!=",
            ItemKind::Folder => "=",
        };
        format!("mimeType{}'{}' and trashed=false", op, FOLDER_MIME_TYPE)
    }

    fn parse_retry_after(response: &HttpResponse) -> Option<Duration> {
        response
            .header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Map a non-2xx response onto a provider error.
    fn classify_failure(response: &HttpResponse, not_found: NotFound<'_>) -> GoogleDriveError {
        let status = response.status;
        let body = response.json::<ApiErrorResponse>().ok().map(|r| r.error);
        let message = body
            .as_ref()
            .map(|b| b.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| response.text_lossy());
        let rate_limited = body.as_ref().map(|b| b.is_rate_limited()).unwrap_or(false);

        match status {
            429 => GoogleDriveError::RateLimitExceeded {
                message,
                retry_after: Self::parse_retry_after(response),
            },
            403 if rate_limited => GoogleDriveError::RateLimitExceeded {
                message,
                retry_after: Self::parse_retry_after(response),
            },
            401 => GoogleDriveError::AuthenticationFailed(message),
            404 => match not_found {
                NotFound::File(file_id) => GoogleDriveError::FileNotFound {
                    file_id: file_id.to_string(),
                },
                NotFound::Permission {
                    file_id,
                    permission_id,
                } => GoogleDriveError::PermissionNotFound {
                    file_id: file_id.to_string(),
                    permission_id: permission_id.to_string(),
                },
                NotFound::Nothing => GoogleDriveError::ApiError {
                    status_code: status,
                    message,
                },
            },
            s if (500..600).contains(&s) => GoogleDriveError::ServiceUnavailable {
                status_code: s,
                message,
            },
            s => GoogleDriveError::ApiError {
                status_code: s,
                message,
            },
        }
    }

    async fn send(&self, request: HttpRequest, not_found: NotFound<'_>) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await.map_err(|e| match e {
            BridgeError::Network(msg) => GoogleDriveError::NetworkError(msg),
            other => GoogleDriveError::BridgeError(other),
        })?;

        if response.is_success() {
            Ok(response)
        } else {
            let error = Self::classify_failure(&response, not_found);
            debug!(status = response.status, error = %error, "Drive request failed");
            Err(error)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        not_found: NotFound<'_>,
    ) -> Result<T> {
        let response = self.send(request, not_found).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("Unexpected response body: {}", e)))
    }

    /// Every permission on a file, across all permission pages.
    async fn list_permissions(&self, item: &Item) -> Result<Vec<Permission>> {
        let mut permissions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(HttpMethod::Get, &format!("/files/{}/permissions", item.id))
                .query("fields", PERMISSION_LIST_FIELDS)
                .query("supportsAllDrives", "true");
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }

            let page: PermissionsListResponse =
                self.get_json(request, NotFound::File(&item.id)).await?;
            permissions.extend(page.permissions);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(item_id = %item.id, count = permissions.len(), "Listed permissions");
        Ok(permissions)
    }

    /// Delete one permission. A permission that is already gone counts as deleted.
    async fn delete_permission(&self, item: &Item, permission_id: &str) -> Result<()> {
        let request = self
            .request(
                HttpMethod::Delete,
                &format!("/files/{}/permissions/{}", item.id, permission_id),
            )
            .query("supportsAllDrives", "true");

        match self
            .send(
                request,
                NotFound::Permission {
                    file_id: &item.id,
                    permission_id,
                },
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(GoogleDriveError::PermissionNotFound { .. }) => {
                debug!(item_id = %item.id, permission_id, "Permission already removed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Individual grantees holding one of `roles`, never including the owner.
    async fn grantees(
        &self,
        item: &Item,
        roles: &[&str],
        role: GranteeRole,
    ) -> Result<Vec<Grantee>> {
        let owner = self.owner_email().await?;

        let grantees = self
            .list_permissions(item)
            .await?
            .into_iter()
            .filter(|p| p.is_individual() && p.role != "owner")
            .filter(|p| roles.contains(&p.role.as_str()))
            .filter(|p| {
                !p.email_address
                    .as_deref()
                    .map(|email| email.eq_ignore_ascii_case(&owner))
                    .unwrap_or(false)
            })
            .map(|p| Grantee {
                identity: p.email_address.clone().unwrap_or_else(|| p.id.clone()),
                id: p.id,
                role,
            })
            .collect();

        Ok(grantees)
    }

    async fn owner_email(&self) -> Result<String> {
        let email = self
            .owner_email
            .get_or_try_init(|| async {
                let request = self
                    .request(HttpMethod::Get, "/about")
                    .query("fields", "user");
                let about: AboutResponse = self.get_json(request, NotFound::Nothing).await?;
                info!(
                    owner = %redact_if_sensitive("owner", &about.user.email_address),
                    "Resolved account owner"
                );
                Ok::<_, GoogleDriveError>(about.user.email_address)
            })
            .await?;

        Ok(email.clone())
    }
}

#[async_trait]
impl ItemSource for GoogleDriveConnector {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn fetch_page(&self, kind: ItemKind, page_token: Option<&str>) -> BridgeResult<ItemPage> {
        let mut request = self
            .request(HttpMethod::Get, "/files")
            .query("q", Self::listing_query(kind))
            .query("pageSize", self.page_size.to_string())
            .query("fields", FILE_LIST_FIELDS)
            .query("supportsAllDrives", "true")
            .query("includeItemsFromAllDrives", "true");
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let list: FilesListResponse = self.get_json(request, NotFound::Nothing).await?;

        let items: Vec<Item> = list
            .files
            .into_iter()
            .map(|f| {
                let kind = if f.is_folder() {
                    ItemKind::Folder
                } else {
                    ItemKind::File
                };
                Item::new(f.id, f.name, kind)
            })
            .collect();

        debug!(
            count = items.len(),
            has_more = list.next_page_token.is_some(),
            "Fetched listing page"
        );

        Ok(ItemPage {
            items,
            next_page_token: list.next_page_token,
        })
    }
}

#[async_trait]
impl SharingApi for GoogleDriveConnector {
    async fn owner_identity(&self) -> BridgeResult<String> {
        Ok(self.owner_email().await?)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn get_sharing_access(&self, item: &Item) -> BridgeResult<SharingAccess> {
        let permissions = self.list_permissions(item).await?;

        let access = if permissions.iter().any(|p| p.kind == "anyone") {
            SharingAccess::AnyoneWithLink
        } else if permissions.iter().any(|p| p.kind == "domain") {
            SharingAccess::Domain
        } else {
            SharingAccess::Private
        };

        Ok(access)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn set_sharing_access(&self, item: &Item, access: SharingAccess) -> BridgeResult<()> {
        if access != SharingAccess::Private {
            return Err(BridgeError::NotAvailable(format!(
                "Granting {:?} access is not supported",
                access
            )));
        }

        let links: Vec<Permission> = self
            .list_permissions(item)
            .await?
            .into_iter()
            .filter(Permission::is_link)
            .collect();

        for permission in &links {
            self.delete_permission(item, &permission.id).await?;
        }

        if !links.is_empty() {
            debug!(removed = links.len(), "Disabled link sharing");
        }
        Ok(())
    }

    async fn list_editors(&self, item: &Item) -> BridgeResult<Vec<Grantee>> {
        Ok(self.grantees(item, EDITOR_ROLES, GranteeRole::Editor).await?)
    }

    #[instrument(skip(self, item, grantee), fields(item_id = %item.id))]
    async fn remove_editor(&self, item: &Item, grantee: &Grantee) -> BridgeResult<()> {
        Ok(self.delete_permission(item, &grantee.id).await?)
    }

    async fn list_viewers(&self, item: &Item) -> BridgeResult<Vec<Grantee>> {
        Ok(self.grantees(item, VIEWER_ROLES, GranteeRole::Viewer).await?)
    }

    #[instrument(skip(self, item, grantee), fields(item_id = %item.id))]
    async fn remove_viewer(&self, item: &Item, grantee: &Grantee) -> BridgeResult<()> {
        Ok(self.delete_permission(item, &grantee.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockall::mock;
    use mockall::predicate::function;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    const ABOUT: &str = r#"{"user": {"displayName": "Owner", "emailAddress": "Owner@Example.com"}}"#;

    const PERMISSIONS: &str = r#"{
        "permissions": [
            {"id": "owner1", "type": "user", "role": "owner", "emailAddress": "owner@example.com"},
            {"id": "anyoneWithLink", "type": "anyone", "role": "reader"},
            {"id": "p1", "type": "user", "role": "writer", "emailAddress": "bob@example.com"},
            {"id": "p2", "type": "group", "role": "fileOrganizer", "emailAddress": "team@example.com"},
            {"id": "p3", "type": "user", "role": "commenter", "emailAddress": "carol@example.com"},
            {"id": "p4", "type": "user", "role": "writer", "emailAddress": "OWNER@example.com"}
        ]
    }"#;

    fn item() -> Item {
        Item::new("file1", "report.pdf", ItemKind::File)
    }

    /// Routes `about` and `permissions` GETs to canned bodies.
    fn drive_with_permissions(permissions: &'static str) -> MockHttpClient {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(move |req| {
                if req.url.contains("/about") {
                    Ok(json_response(200, ABOUT))
                } else {
                    Ok(json_response(200, permissions))
                }
            });
        mock_http
    }

    #[tokio::test]
    async fn test_fetch_files_page() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| {
                req.method == HttpMethod::Get
                    && req.url.contains("/files?q=mimeType%21%3D%27application%2Fvnd.google-apps.folder%27")
                    && req.url.contains("pageSize=50")
                    && req.url.contains("includeItemsFromAllDrives=true")
                    && !req.url.contains("pageToken")
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer test_token")
            }))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"nextPageToken": "page2", "files": [
                        {"id": "f1", "name": "a.txt", "mimeType": "text/plain"},
                        {"id": "f2", "name": "b.txt", "mimeType": "text/plain"}
                    ]}"#,
                ))
            });

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string())
            .with_page_size(50);
        let page = connector.fetch_page(ItemKind::File, None).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0], Item::new("f1", "a.txt", ItemKind::File));
        assert_eq!(page.next_page_token.as_deref(), Some("page2"));
    }

    #[tokio::test]
    async fn test_fetch_folders_page_with_token() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| {
                req.url.contains("q=mimeType%3D%27application%2Fvnd.google-apps.folder%27")
                    && req.url.contains("pageToken=abc")
            }))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"files": [{"id": "d1", "name": "Shared", "mimeType": "application/vnd.google-apps.folder"}]}"#,
                ))
            });

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        let page = connector
            .fetch_page(ItemKind::Folder, Some("abc"))
            .await
            .unwrap();

        assert_eq!(page.items[0].kind, ItemKind::Folder);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_owner_identity_is_cached() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| req.url.contains("/about?fields=user")))
            .times(1)
            .returning(|_| Ok(json_response(200, ABOUT)));

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());

        assert_eq!(connector.owner_identity().await.unwrap(), "Owner@Example.com");
        assert_eq!(connector.owner_identity().await.unwrap(), "Owner@Example.com");
    }

    #[tokio::test]
    async fn test_sharing_access_levels() {
        let connector = GoogleDriveConnector::new(
            Arc::new(drive_with_permissions(PERMISSIONS)),
            "test_token".to_string(),
        );
        assert_eq!(
            connector.get_sharing_access(&item()).await.unwrap(),
            SharingAccess::AnyoneWithLink
        );

        let connector = GoogleDriveConnector::new(
            Arc::new(drive_with_permissions(
                r#"{"permissions": [{"id": "d", "type": "domain", "role": "reader", "domain": "example.com"}]}"#,
            )),
            "test_token".to_string(),
        );
        assert_eq!(
            connector.get_sharing_access(&item()).await.unwrap(),
            SharingAccess::Domain
        );

        let connector = GoogleDriveConnector::new(
            Arc::new(drive_with_permissions(r#"{"permissions": []}"#)),
            "test_token".to_string(),
        );
        assert_eq!(
            connector.get_sharing_access(&item()).await.unwrap(),
            SharingAccess::Private
        );
    }

    #[tokio::test]
    async fn test_editors_exclude_owner() {
        let connector = GoogleDriveConnector::new(
            Arc::new(drive_with_permissions(PERMISSIONS)),
            "test_token".to_string(),
        );

        let editors = connector.list_editors(&item()).await.unwrap();
        let identities: Vec<_> = editors.iter().map(|g| g.identity.as_str()).collect();

        assert_eq!(identities, vec!["bob@example.com", "team@example.com"]);
        assert!(editors.iter().all(|g| g.role == GranteeRole::Editor));
    }

    #[tokio::test]
    async fn test_viewers_include_commenters() {
        let connector = GoogleDriveConnector::new(
            Arc::new(drive_with_permissions(PERMISSIONS)),
            "test_token".to_string(),
        );

        let viewers = connector.list_viewers(&item()).await.unwrap();

        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].id, "p3");
        assert_eq!(viewers[0].role, GranteeRole::Viewer);
    }

    #[tokio::test]
    async fn test_permissions_follow_pagination() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| !req.url.contains("pageToken")))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"nextPageToken": "more", "permissions": [{"id": "p1", "type": "user", "role": "reader", "emailAddress": "a@example.com"}]}"#,
                ))
            });
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| req.url.contains("pageToken=more")))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"permissions": [{"id": "anyoneWithLink", "type": "anyone", "role": "reader"}]}"#,
                ))
            });

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());

        assert_eq!(
            connector.get_sharing_access(&item()).await.unwrap(),
            SharingAccess::AnyoneWithLink
        );
    }

    #[tokio::test]
    async fn test_set_private_deletes_link_permissions() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| req.method == HttpMethod::Get))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"permissions": [
                        {"id": "anyoneWithLink", "type": "anyone", "role": "reader"},
                        {"id": "dom", "type": "domain", "role": "writer", "domain": "example.com"},
                        {"id": "p1", "type": "user", "role": "writer", "emailAddress": "bob@example.com"}
                    ]}"#,
                ))
            });
        mock_http
            .expect_execute()
            .with(function(|req: &HttpRequest| {
                req.method == HttpMethod::Delete
                    && (req.url.contains("/files/file1/permissions/anyoneWithLink")
                        || req.url.contains("/files/file1/permissions/dom"))
            }))
            .times(2)
            .returning(|_| Ok(json_response(204, "")));

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        connector
            .set_sharing_access(&item(), SharingAccess::Private)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_public_is_not_supported() {
        let connector =
            GoogleDriveConnector::new(Arc::new(MockHttpClient::new()), "test_token".to_string());

        let err = connector
            .set_sharing_access(&item(), SharingAccess::AnyoneWithLink)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_permission_is_ok() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                404,
                r#"{"error": {"code": 404, "message": "Permission not found: p1.", "errors": [{"reason": "notFound"}]}}"#,
            ))
        });

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        let grantee = Grantee {
            id: "p1".to_string(),
            identity: "bob@example.com".to_string(),
            role: GranteeRole::Editor,
        };

        assert!(connector.remove_editor(&item(), &grantee).await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_throttled() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            let mut response = json_response(
                403,
                r#"{"error": {"code": 403, "message": "Rate Limit Exceeded", "errors": [{"reason": "rateLimitExceeded"}]}}"#,
            );
            response
                .headers
                .insert("retry-after".to_string(), "3".to_string());
            Ok(response)
        });

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        let err = connector
            .fetch_page(ItemKind::File, None)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        for (status, transient, fatal) in [
            (429, true, false),
            (500, true, false),
            (503, true, false),
            (400, false, false),
            (401, false, true),
            (403, false, false),
            (404, false, false),
        ] {
            let mut mock_http = MockHttpClient::new();
            mock_http
                .expect_execute()
                .times(1)
                .returning(move |_| Ok(json_response(status, "oops")));

            let connector =
                GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
            let err = connector.get_sharing_access(&item()).await.unwrap_err();

            assert_eq!(err.is_transient(), transient, "status {}", status);
            assert_eq!(err.is_fatal(), fatal, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_transient() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Network("connection reset".to_string())));

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        let err = connector.owner_identity().await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_malformed_body_is_permanent() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, "<html>")));

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), "test_token".to_string());
        let err = connector.fetch_page(ItemKind::File, None).await.unwrap_err();

        assert!(!err.is_transient());
    }
}
