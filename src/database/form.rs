use std::str::FromStr;

use super::error::{ApiError, ValidationErrors};

pub type QueryPairs = Vec<(String, String)>;

/// Decoded query string. Keys may repeat, e.g. `?tags=breakfast&tags=lunch`.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    inner: QueryPairs,
}

impl QueryParams {
    pub fn from_pairs(pairs: QueryPairs) -> Self {
        Self { inner: pairs }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            None | Some("") => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| ValidationErrors::single(key, "A valid integer is required.").into()),
        }
    }

    pub fn get_flag(&self, key: &str) -> Result<bool, ApiError> {
        match self.get_str(key) {
            None | Some("") => Ok(false),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(ValidationErrors::single(key, "A valid boolean is required.").into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_collected() {
        let query = params(&[("tags", "breakfast"), ("page", "2"), ("tags", "lunch")]);
        assert_eq!(query.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(query.get_number::<i64>("page").unwrap(), Some(2));
        assert_eq!(query.get_number::<i64>("limit").unwrap(), None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let query = params(&[("author", "abc")]);
        match query.get_number::<i32>("author") {
            Err(ApiError::Validation(errors)) => assert!(errors.get("author").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn flags_accept_numeric_and_word_forms() {
        let query = params(&[("is_favorited", "1"), ("is_in_shopping_cart", "False")]);
        assert!(query.get_flag("is_favorited").unwrap());
        assert!(!query.get_flag("is_in_shopping_cart").unwrap());
        assert!(!query.get_flag("missing").unwrap());
        assert!(params(&[("x", "maybe")]).get_flag("x").is_err());
    }
}
