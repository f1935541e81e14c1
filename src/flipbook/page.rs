//! Static page content and its per-slot memo.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use super::Orientation;
use crate::catalog::CatalogItem;

const LANDSCAPE_PADDING: f64 = 50.0;
const PORTRAIT_PADDING: f64 = 20.0;

/// What one page shows: the product image, its code label and the
/// 1-based page number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContent {
    pub image: String,
    pub code: String,
    pub number: usize,
    pub padding: f64,
    pub orientation: Orientation,
}

impl PageContent {
    pub fn build(index: usize, item: &CatalogItem, orientation: Orientation) -> Self {
        let padding = match orientation {
            Orientation::Landscape => LANDSCAPE_PADDING,
            Orientation::Portrait => PORTRAIT_PADDING,
        };
        Self {
            image: item.image.clone(),
            code: item.code.clone(),
            number: index + 1,
            padding,
            orientation,
        }
    }
}

impl fmt::Display for PageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>3}] {} <{}>", self.number, self.code, self.image)
    }
}

/// Renders page content for mounted slots, reusing the previous result
/// while the slot's code and orientation are unchanged.
#[derive(Debug, Default)]
pub struct PageRenderer {
    slots: HashMap<usize, Arc<PageContent>>,
    renders: u64,
}

impl PageRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        index: usize,
        item: &CatalogItem,
        orientation: Orientation,
    ) -> Arc<PageContent> {
        if let Some(prev) = self.slots.get(&index) {
            if prev.code == item.code && prev.orientation == orientation {
                return Arc::clone(prev);
            }
        }
        let content = Arc::new(PageContent::build(index, item, orientation));
        self.renders += 1;
        self.slots.insert(index, Arc::clone(&content));
        content
    }

    /// Drop every slot outside `window`.
    pub fn retain(&mut self, window: &Range<usize>) {
        self.slots.retain(|idx, _| window.contains(idx));
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn is_mounted(&self, index: usize) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn mounted_count(&self) -> usize {
        self.slots.len()
    }
}
