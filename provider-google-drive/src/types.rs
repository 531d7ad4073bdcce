//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource, reduced to the fields requested.
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mime_type: String,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google Drive API permission resource
///
/// See: https://developers.google.com/drive/api/v3/reference/permissions#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,

    /// Grantee type: `user`, `group`, `domain` or `anyone`
    #[serde(rename = "type")]
    pub kind: String,

    /// `owner`, `organizer`, `fileOrganizer`, `writer`, `commenter` or `reader`
    pub role: String,

    #[serde(default)]
    pub email_address: Option<String>,

    #[serde(default)]
    pub domain: Option<String>,
}

impl Permission {
    pub fn is_link(&self) -> bool {
        matches!(self.kind.as_str(), "anyone" | "domain")
    }

    pub fn is_individual(&self) -> bool {
        matches!(self.kind.as_str(), "user" | "group")
    }
}

/// Google Drive API permissions.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/permissions/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsListResponse {
    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google Drive API about.get response with `fields=user`
///
/// See: https://developers.google.com/drive/api/v3/reference/about
#[derive(Debug, Deserialize)]
pub struct AboutResponse {
    pub user: DriveUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub display_name: Option<String>,

    pub email_address: String,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,
}

impl ApiErrorBody {
    /// Whether Drive reported a per-user or project quota being hit.
    pub fn is_rate_limited(&self) -> bool {
        self.errors.iter().any(|e| {
            matches!(
                e.reason.as_str(),
                "rateLimitExceeded" | "userRateLimitExceeded" | "quotaExceeded"
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "nextPageToken": "token123",
            "files": [
                {"id": "file1", "name": "report.pdf", "mimeType": "application/pdf"},
                {"id": "dir1", "name": "Shared", "mimeType": "application/vnd.google-apps.folder"}
            ]
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 2);
        assert!(!response.files[0].is_folder());
        assert!(response.files[1].is_folder());
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_deserialize_last_page_without_token() {
        let response: FilesListResponse = serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_deserialize_permissions() {
        let json = r#"{
            "permissions": [
                {"id": "anyoneWithLink", "type": "anyone", "role": "reader"},
                {"id": "p1", "type": "user", "role": "writer", "emailAddress": "bob@example.com"},
                {"id": "p2", "type": "domain", "role": "reader", "domain": "example.com"}
            ]
        }"#;

        let response: PermissionsListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.permissions.len(), 3);
        assert!(response.permissions[0].is_link());
        assert!(response.permissions[1].is_individual());
        assert_eq!(
            response.permissions[1].email_address.as_deref(),
            Some("bob@example.com")
        );
        assert_eq!(response.permissions[2].domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_deserialize_rate_limit_error() {
        let json = r#"{
            "error": {
                "code": 403,
                "message": "User Rate Limit Exceeded",
                "errors": [{"domain": "usageLimits", "reason": "userRateLimitExceeded", "message": "User Rate Limit Exceeded"}]
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 403);
        assert!(response.error.is_rate_limited());
    }

    #[test]
    fn test_permission_denied_is_not_rate_limited() {
        let json = r#"{"error": {"code": 403, "message": "Forbidden", "errors": [{"reason": "insufficientFilePermissions"}]}}"#;

        let response: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert!(!response.error.is_rate_limited());
    }
}
