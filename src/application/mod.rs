pub mod adapters;

use compact_str::CompactString;

use crate::domain::engine::LayoutEngine;
use crate::domain::errors::PageError;
use crate::domain::page::PageSpec;
use crate::domain::scene::Scene;

pub const SERVICE_NAME: &str = "layoutkit";
pub const API_VERSION: &str = "1";

#[derive(Copy, Clone, Debug, Default)]
pub struct LayoutService {}

impl LayoutService {
    pub fn layout_page(&self, page: PageSpec) -> Result<Scene, PageError> {
        page.validate()?;
        Ok(LayoutEngine::layout(&page))
    }

    /// Scenes coming off the wire have already had their defaults filled in
    /// by the adapters; only the page still needs checking.
    pub fn normalize(&self, scene: Scene) -> Result<Scene, PageError> {
        scene.page.validate()?;
        Ok(scene)
    }
}

/// State shared by every route handler.
#[derive(Clone, Debug)]
pub struct ServerData {
    pub service: CompactString,
    pub api_version: CompactString,
    pub layout: LayoutService,
}

impl ServerData {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.into(),
            api_version: API_VERSION.into(),
            layout: LayoutService::default(),
        }
    }
}

impl Default for ServerData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_data_names_the_service() {
        let data = ServerData::default();
        assert_eq!(data.service, SERVICE_NAME);
        assert_eq!(data.api_version, API_VERSION);
    }
}
