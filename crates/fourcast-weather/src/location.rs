//! Device location sources.
//!
//! The permission prompt is the caller's concern: a locator reports either a
//! position or `PermissionDenied`, and a denial is not retried.

use async_trait::async_trait;

use crate::types::{Coordinate, LocationError};

#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, LocationError>;
}

/// Locator that always reports the same position
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    position: Coordinate,
}

impl FixedLocator {
    pub fn new(position: Coordinate) -> Self {
        Self { position }
    }
}

#[async_trait]
impl DeviceLocator for FixedLocator {
    async fn current_position(&self) -> Result<Coordinate, LocationError> {
        Ok(self.position)
    }
}

/// Locator for a user who declined the location permission
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedLocator;

#[async_trait]
impl DeviceLocator for DeniedLocator {
    async fn current_position(&self) -> Result<Coordinate, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_fixed_locator_reports_position() {
        let locator = FixedLocator::new(Coordinate::new(47.6, -122.3));
        assert_eq!(
            locator.current_position().await.unwrap(),
            Coordinate::new(47.6, -122.3)
        );
    }

    #[tokio::test]
    async fn test_denied_locator() {
        let result = DeniedLocator.current_position().await;
        assert!(matches!(result, Err(LocationError::PermissionDenied)));
    }
}
