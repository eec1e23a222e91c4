use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// The platform permission primitive: query the current status and issue a
/// one-time prompt when it is undetermined.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn status(&self) -> PermissionStatus;
    async fn request(&self) -> PermissionStatus;
}

/// Desktop notifications need no runtime prompt, so the production provider
/// always reports granted.
#[derive(Debug, Default)]
pub struct AlwaysGrantedPermission;

#[async_trait]
impl PermissionProvider for AlwaysGrantedPermission {
    async fn status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}
