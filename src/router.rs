//! The three catalog screens and how they are mounted.

use log::info;
use thiserror::Error;

use crate::audio::FeedbackGate;
use crate::catalog::CatalogSource;
use crate::config::Thresholds;
use crate::flipbook::{FlipbookController, Surface};
use crate::locale::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub id: u8,
    pub catalog_key: &'static str,
    /// Locale key of the catalog's display name.
    pub name_key: &'static str,
}

impl Route {
    pub fn path(&self) -> String {
        format!("/catalog/{}", self.catalog_key)
    }
}

pub const ROUTES: [Route; 3] = [
    Route {
        id: 1,
        catalog_key: "catalog1",
        name_key: "embroidered",
    },
    Route {
        id: 2,
        catalog_key: "catalog2",
        name_key: "printed",
    },
    Route {
        id: 3,
        catalog_key: "catalog3",
        name_key: "lace",
    },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown catalog '{0}' (try catalog1, catalog2 or catalog3)")]
    Unknown(String),
}

/// Accepts `catalog2`, `2` or `/catalog/catalog2`.
pub fn resolve(target: &str) -> Result<&'static Route, RouteError> {
    let t = target.trim();
    let key = t.strip_prefix("/catalog/").unwrap_or(t);
    ROUTES
        .iter()
        .find(|r| r.catalog_key == key || key.parse::<u8>().is_ok_and(|id| id == r.id))
        .ok_or_else(|| RouteError::Unknown(target.to_string()))
}

/// A mounted catalog screen: its translated titles and the flipbook.
pub struct CatalogScreen {
    pub route: Route,
    pub title: String,
    pub name: String,
    pub flipbook: FlipbookController,
}

pub fn mount(
    route: &Route,
    source: &dyn CatalogSource,
    locale: &Locale,
    surface: Surface,
    th: &Thresholds,
    feedback: FeedbackGate,
) -> CatalogScreen {
    info!("router: {} -> loading {}", route.path(), route.catalog_key);
    let items = source.fetch_catalog(route.catalog_key);
    if items.is_empty() {
        info!("router: {} has no pages", route.catalog_key);
    }
    CatalogScreen {
        route: *route,
        title: locale.translate("product_catalog"),
        name: locale.translate(route.name_key),
        flipbook: FlipbookController::new(items, surface, th, feedback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogItem, StaticCatalog};
    use crate::locale::Language;

    #[test]
    fn resolves_all_spellings() {
        assert_eq!(resolve("catalog2").unwrap().id, 2);
        assert_eq!(resolve("3").unwrap().catalog_key, "catalog3");
        assert_eq!(resolve("/catalog/catalog1").unwrap().name_key, "embroidered");
        assert_eq!(
            resolve("catalog9"),
            Err(RouteError::Unknown("catalog9".into()))
        );
        assert_eq!(ROUTES[1].path(), "/catalog/catalog2");
    }

    #[test]
    fn mount_loads_items_and_titles() {
        let src = StaticCatalog::new().with(
            "catalog3",
            vec![CatalogItem::new("L-1", "a.jpg"), CatalogItem::new("L-2", "b.jpg")],
        );
        let screen = mount(
            resolve("3").unwrap(),
            &src,
            &Locale::new(Language::En),
            Surface::new(800.0, 1200.0),
            &Thresholds::default(),
            FeedbackGate::silent(200),
        );
        assert_eq!(screen.title, "Product Catalog");
        assert_eq!(screen.name, "Lace");
        assert_eq!(screen.flipbook.len(), 2);
    }

    #[test]
    fn mount_of_missing_catalog_is_empty() {
        let screen = mount(
            &ROUTES[0],
            &StaticCatalog::new(),
            &Locale::new(Language::Tr),
            Surface::new(800.0, 1200.0),
            &Thresholds::default(),
            FeedbackGate::silent(200),
        );
        assert!(screen.flipbook.is_empty());
        assert_eq!(screen.name, "Nakışlı");
    }
}
