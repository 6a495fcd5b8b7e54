// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub const DEFAULT_SIBLING_COUNT: usize = 1;
pub const DEFAULT_JUMP_STRIDE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// 1-based page number.
    Page(usize),
    Ellipsis,
}

pub fn total_pages(total_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size)
}

/// Page strip for a pager control: both anchors, a window of `sibling_count`
/// pages around `current_page` (0-based), and an ellipsis over every hidden run.
pub fn compute_range(
    current_page: usize,
    total_count: usize,
    page_size: usize,
    sibling_count: usize,
) -> Vec<PageItem> {
    let pages = total_pages(total_count, page_size);
    if pages == 0 {
        return Vec::new();
    }

    let current = current_page.min(pages - 1) + 1;
    let start = current.saturating_sub(sibling_count).max(1);
    let end = current.saturating_add(sibling_count).min(pages);

    let mut shown = Vec::with_capacity(end - start + 3);
    shown.push(1);
    shown.extend((start..=end).filter(|page| *page != 1 && *page != pages));
    if pages > 1 {
        shown.push(pages);
    }

    let mut items = Vec::with_capacity(shown.len() + 2);
    let mut previous = 0;
    for page in shown {
        if previous != 0 && page - previous > 1 {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(page));
        previous = page;
    }
    items
}

/// Navigation helpers around [`compute_range`]. Every method returns the
/// target 0-based page, or `None` when it would not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePaginator {
    pub sibling_count: usize,
    pub jump_stride: usize,
}

impl Default for TablePaginator {
    fn default() -> Self {
        Self {
            sibling_count: DEFAULT_SIBLING_COUNT,
            jump_stride: DEFAULT_JUMP_STRIDE,
        }
    }
}

impl TablePaginator {
    pub fn range(
        &self,
        current_page: usize,
        total_count: usize,
        page_size: usize,
    ) -> Vec<PageItem> {
        compute_range(current_page, total_count, page_size, self.sibling_count)
    }

    pub fn jump(&self, current_page: usize, pages: usize, forward: bool) -> Option<usize> {
        let target = if forward {
            current_page.saturating_add(self.jump_stride)
        } else {
            current_page.saturating_sub(self.jump_stride)
        };
        clamp_target(current_page, target, pages)
    }

    pub fn next(&self, current_page: usize, pages: usize) -> Option<usize> {
        clamp_target(current_page, current_page.saturating_add(1), pages)
    }

    pub fn previous(&self, current_page: usize, pages: usize) -> Option<usize> {
        clamp_target(current_page, current_page.saturating_sub(1), pages)
    }

    pub fn first(&self, current_page: usize, pages: usize) -> Option<usize> {
        clamp_target(current_page, 0, pages)
    }

    pub fn last(&self, current_page: usize, pages: usize) -> Option<usize> {
        clamp_target(current_page, pages.saturating_sub(1), pages)
    }
}

fn clamp_target(current_page: usize, target: usize, pages: usize) -> Option<usize> {
    if pages == 0 {
        return None;
    }
    let target = target.min(pages - 1);
    (target != current_page).then_some(target)
}
