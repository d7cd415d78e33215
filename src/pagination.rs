use crate::query::Pagination;

/// What the pagination footer under a grid needs to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationFooter {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub page_count: u32,
    /// One-based index of the first row shown, 0 when the page is empty.
    pub first_row: u64,
    pub last_row: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub size_options: Vec<u32>,
}

impl PaginationFooter {
    pub fn new(pagination: Pagination, size_options: &[u32]) -> Self {
        let size = pagination.size.max(1);
        let page = pagination.page.max(1);
        let page_count = pagination.total.div_ceil(size as u64).min(u32::MAX as u64) as u32;

        let start = (page as u64 - 1) * size as u64;
        let (first_row, last_row) = if start >= pagination.total {
            (0, 0)
        } else {
            (start + 1, (start + size as u64).min(pagination.total))
        };

        let mut size_options = size_options.to_vec();
        if !size_options.contains(&size) {
            size_options.push(size);
            size_options.sort_unstable();
        }

        PaginationFooter {
            page,
            size,
            total: pagination.total,
            page_count,
            first_row,
            last_row,
            has_previous: page > 1,
            has_next: page < page_count,
            size_options,
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{}-{} of {} (page {} of {})",
            self.first_row,
            self.last_row,
            self.total,
            self.page,
            self.page_count.max(1)
        )
    }
}
