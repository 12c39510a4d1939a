//! Component update builder.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reloadable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl ComponentUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.active.is_none()
            && self.reloadable.is_none()
            && self.payload.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ComponentUpdateBuilder(ComponentUpdate);

impl ComponentUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(ComponentUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.0.active = Some(active);
        self
    }

    #[must_use]
    pub const fn reloadable(mut self, reloadable: bool) -> Self {
        self.0.reloadable = Some(reloadable);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.0.payload = Some(payload.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ComponentUpdate {
        self.0
    }
}
