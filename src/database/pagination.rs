use serde::Serialize;

use crate::{
    constants::{MAX_PAGE_SIZE, RECIPE_COUNT_PER_PAGE},
    error::{ApiError, ValidationErrors},
    form::QueryParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: RECIPE_COUNT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self, ApiError> {
        let page = params.get_number::<i64>("page")?.unwrap_or(1);
        let limit = params
            .get_number::<i64>("limit")?
            .unwrap_or(RECIPE_COUNT_PER_PAGE);

        let mut errors = ValidationErrors::new();
        if page < 1 {
            errors.add("page", "Page number must be at least 1.");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            errors.add("limit", &format!("Limit must be between 1 and {MAX_PAGE_SIZE}."));
        }
        errors.into_result()?;

        // Pages whose offset does not fit are past the end of any table.
        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::NotFound);
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// `{count, next, previous, results}` envelope.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// `filters` are the query pairs the links must keep, e.g. `tags` or `author`.
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        request: &PageRequest,
        path: &str,
        filters: &[(String, String)],
    ) -> Result<Self, ApiError> {
        if rows.is_empty() && request.page > 1 {
            return Err(ApiError::NotFound);
        }

        let shown = request.offset().saturating_add(rows.len() as i64);
        let next = (shown < total_rows).then(|| page_link(path, filters, request.page + 1, request.limit));
        let previous =
            (request.page > 1).then(|| page_link(path, filters, request.page - 1, request.limit));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }
}

fn page_link(path: &str, filters: &[(String, String)], page: i64, limit: i64) -> String {
    let mut pairs: Vec<(String, String)> = filters
        .iter()
        .filter(|(k, _)| k != "page" && k != "limit")
        .cloned()
        .collect();
    pairs.push(("page".to_owned(), page.to_string()));
    pairs.push(("limit".to_owned(), limit.to_string()));

    match serde_urlencoded::to_string(&pairs) {
        Ok(query) => format!("{path}?{query}"),
        Err(e) => {
            log::warn!("Failed to encode page link: {e}");
            format!("{path}?page={page}&limit={limit}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: i64, limit: i64) -> PageRequest {
        PageRequest { page, limit }
    }

    #[test]
    fn defaults_to_first_page_of_six() {
        let request = PageRequest::from_params(&QueryParams::default()).unwrap();
        assert_eq!(request, PageRequest { page: 1, limit: 6 });
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn rejects_out_of_range_limits() {
        let params = QueryParams::from_pairs(vec![
            ("page".to_owned(), "0".to_owned()),
            ("limit".to_owned(), "1000".to_owned()),
        ]);
        match PageRequest::from_params(&params) {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.get("page").is_some());
                assert!(errors.get("limit").is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_page_number_is_not_found() {
        let params = QueryParams::from_pairs(vec![("page".to_owned(), i64::MAX.to_string())]);
        assert!(matches!(
            PageRequest::from_params(&params),
            Err(ApiError::NotFound)
        ));

        let params = QueryParams::from_pairs(vec![
            ("page".to_owned(), (i64::MAX / 100).to_string()),
            ("limit".to_owned(), "100".to_owned()),
        ]);
        assert!(PageRequest::from_params(&params).is_ok());
    }

    #[test]
    fn middle_page_links_both_ways() {
        let filters = vec![("tags".to_owned(), "lunch".to_owned())];
        let page = Page::from_rows(vec![1, 2], 7, &request(2, 2), "/api/recipes/", &filters).unwrap();

        assert_eq!(page.count, 7);
        assert_eq!(page.next.as_deref(), Some("/api/recipes/?tags=lunch&page=3&limit=2"));
        assert_eq!(page.previous.as_deref(), Some("/api/recipes/?tags=lunch&page=1&limit=2"));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::from_rows(vec![7], 7, &request(4, 2), "/api/users/", &[]).unwrap();
        assert!(page.next.is_none());
        assert!(page.previous.is_some());
    }

    #[test]
    fn empty_first_page_is_valid_but_later_pages_are_not() {
        let page = Page::<i32>::from_rows(vec![], 0, &request(1, 6), "/api/recipes/", &[]).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none() && page.previous.is_none());

        assert!(matches!(
            Page::<i32>::from_rows(vec![], 0, &request(3, 6), "/api/recipes/", &[]),
            Err(ApiError::NotFound)
        ));
    }
}
