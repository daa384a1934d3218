//! Paging of the grouped tables.
//!
//! The backend is paged by payment, but the console pages by patient group,
//! so groups are built from every fetched payment and then sliced here.

use maud::{Markup, html};

/// The config for pagination
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationConfig {
    /// The number of rows shown per page.
    pub page_size: u64,
    /// The maximum number of page links shown in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_pages: 5,
        }
    }
}

/// One element of the pagination bar.
#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    Page(u64),
    CurrPage(u64),
    Ellipsis,
    NextButton(u64),
    BackButton(u64),
}

/// The number of pages needed for `item_count` items, at least one.
pub fn page_count(item_count: usize, page_size: u64) -> u64 {
    let page_size = page_size.max(1);

    (item_count as u64).div_ceil(page_size).max(1)
}

/// The items on `page` (starting from 1), empty if the page is out of range.
pub fn page_slice<T>(items: &[T], page: u64, page_size: u64) -> &[T] {
    let page_size = page_size.max(1) as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(page_size);

    if start >= items.len() {
        return &[];
    }

    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Build the pagination bar for `curr_page` out of `page_count` pages.
///
/// At most `max_pages` consecutive pages are listed, centred on the current
/// page. The first and last pages are always reachable, with an ellipsis
/// standing in for any pages skipped in between.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    if page_count <= 1 {
        return Vec::new();
    }

    let curr_page = curr_page.clamp(1, page_count);
    let window = max_pages.clamp(1, page_count);
    let first = curr_page
        .saturating_sub(window / 2)
        .clamp(1, page_count - window + 1);
    let last = first + window - 1;

    let mut indicators = Vec::new();

    if curr_page > 1 {
        indicators.push(PaginationIndicator::BackButton(curr_page - 1));
    }

    if first > 1 {
        indicators.push(PaginationIndicator::Page(1));

        if first > 2 {
            indicators.push(PaginationIndicator::Ellipsis);
        }
    }

    indicators.extend((first..=last).map(|page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    }));

    if last < page_count {
        if last < page_count - 1 {
            indicators.push(PaginationIndicator::Ellipsis);
        }

        indicators.push(PaginationIndicator::Page(page_count));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}

/// Render the pagination bar, using `page_url` to link to each page.
pub fn pagination_html(
    indicators: &[PaginationIndicator],
    page_url: impl Fn(u64) -> String,
) -> Markup {
    let link_style = "block px-3 py-2 leading-tight text-gray-500 bg-white \
        border border-gray-300 hover:bg-gray-100 hover:text-gray-700 \
        dark:bg-gray-800 dark:border-gray-700 dark:text-gray-400 \
        dark:hover:bg-gray-700 dark:hover:text-white";
    let current_style = "block px-3 py-2 leading-tight text-blue-600 \
        border border-gray-300 bg-blue-50 dark:border-gray-700 \
        dark:bg-gray-700 dark:text-white";

    html! {
        @if !indicators.is_empty() {
            nav aria-label="Pagination" class="my-4"
            {
                ul class="inline-flex -space-x-px text-sm"
                {
                    @for indicator in indicators {
                        li
                        {
                            @match indicator {
                                PaginationIndicator::BackButton(page) => {
                                    a href=(page_url(*page)) class=(link_style) { "Back" }
                                }
                                PaginationIndicator::NextButton(page) => {
                                    a href=(page_url(*page)) class=(link_style) { "Next" }
                                }
                                PaginationIndicator::Page(page) => {
                                    a href=(page_url(*page)) class=(link_style) { (page) }
                                }
                                PaginationIndicator::CurrPage(page) => {
                                    span aria-current="page" class=(current_style) { (page) }
                                }
                                PaginationIndicator::Ellipsis => {
                                    span class=(link_style) { "..." }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
