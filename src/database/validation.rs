use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    constants::{
        COLOR_MAX_LENGTH, EMAIL_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH,
        RESERVED_USERNAMES, USER_FIELD_MAX_LENGTH,
    },
    error::ValidationErrors,
    schema::Id,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Required non-blank text with a length cap. Pushes into `errors` and returns the trimmed value.
fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: Option<usize>,
) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(value) => optional_text(errors, field, Some(value), max),
    }
}

fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: Option<usize>,
) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            errors.add(field, &too_long(max));
            return None;
        }
    }
    Some(value.to_owned())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !valid_chars {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_owned(),
        );
    }
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(format!("Username '{username}' is not allowed."));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let invalid = || "Enter a valid email address.".to_owned();
    let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), String> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if color.len() != COLOR_MAX_LENGTH || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("Enter a valid hex color, e.g. #49B64E.".to_owned());
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".to_owned(),
        );
    }
    Ok(())
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct NewUserPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl NewUserPayload {
    pub fn validate(self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = required_text(&mut errors, "email", self.email.as_deref(), Some(EMAIL_MAX_LENGTH));
        if let Some(Err(e)) = email.as_deref().map(validate_email) {
            errors.add("email", &e);
        }
        let username = required_text(
            &mut errors,
            "username",
            self.username.as_deref(),
            Some(USER_FIELD_MAX_LENGTH),
        );
        if let Some(Err(e)) = username.as_deref().map(validate_username) {
            errors.add("username", &e);
        }
        let first_name = required_text(
            &mut errors,
            "first_name",
            self.first_name.as_deref(),
            Some(USER_FIELD_MAX_LENGTH),
        );
        let last_name = required_text(
            &mut errors,
            "last_name",
            self.last_name.as_deref(),
            Some(USER_FIELD_MAX_LENGTH),
        );
        let password = validate_password(&mut errors, "password", self.password.as_deref());

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password))
                if errors.is_empty() =>
            {
                Ok(NewUser {
                    email: email.to_lowercase(),
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Passwords are not trimmed.
fn validate_password(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<String> {
    match value {
        None => errors.add(field, REQUIRED),
        Some("") => errors.add(field, BLANK),
        Some(value) if value.chars().count() > PASSWORD_MAX_LENGTH => {
            errors.add(field, &too_long(PASSWORD_MAX_LENGTH))
        }
        Some(value) => return Some(value.to_owned()),
    }
    None
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SetPasswordPayload {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

impl SetPasswordPayload {
    /// Returns `(current, new)`.
    pub fn validate(self) -> Result<(String, String), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let current = validate_password(&mut errors, "current_password", self.current_password.as_deref());
        let new = validate_password(&mut errors, "new_password", self.new_password.as_deref());
        match (current, new) {
            (Some(current), Some(new)) => Ok((current, new)),
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    pub fn validate(self) -> Result<(String, String), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = required_text(&mut errors, "email", self.email.as_deref(), None);
        let password = validate_password(&mut errors, "password", self.password.as_deref());
        match (email, password) {
            (Some(email), Some(password)) => Ok((email.to_lowercase(), password)),
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct TagPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagChanges {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

impl TagPayload {
    pub fn validate_new(self) -> Result<TagChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [("name", &self.name), ("color", &self.color), ("slug", &self.slug)] {
            if value.is_none() {
                errors.add(field, REQUIRED);
            }
        }
        let changes = self.validate_changes();
        match changes {
            Ok(changes) if errors.is_empty() => Ok(changes),
            Ok(_) => Err(errors),
            Err(more) => Err(merge(errors, more)),
        }
    }

    pub fn validate_changes(self) -> Result<TagChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = optional_text(&mut errors, "name", self.name.as_deref(), Some(NAME_MAX_LENGTH));
        let color = optional_text(&mut errors, "color", self.color.as_deref(), Some(COLOR_MAX_LENGTH));
        if let Some(Err(e)) = color.as_deref().map(validate_color) {
            errors.add("color", &e);
        }
        let slug = optional_text(&mut errors, "slug", self.slug.as_deref(), Some(NAME_MAX_LENGTH));
        if let Some(Err(e)) = slug.as_deref().map(validate_slug) {
            errors.add("slug", &e);
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(TagChanges {
            name,
            color: color.map(|c| c.to_uppercase()),
            slug,
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientChanges {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

impl IngredientPayload {
    pub fn validate_new(self) -> Result<IngredientChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = required_text(&mut errors, "name", self.name.as_deref(), Some(NAME_MAX_LENGTH));
        let unit = required_text(
            &mut errors,
            "measurement_unit",
            self.measurement_unit.as_deref(),
            Some(NAME_MAX_LENGTH),
        );
        errors.is_empty().then_some(()).ok_or(errors)?;
        Ok(IngredientChanges {
            name,
            measurement_unit: unit,
        })
    }

    pub fn validate_changes(self) -> Result<IngredientChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = optional_text(&mut errors, "name", self.name.as_deref(), Some(NAME_MAX_LENGTH));
        let unit = optional_text(
            &mut errors,
            "measurement_unit",
            self.measurement_unit.as_deref(),
            Some(NAME_MAX_LENGTH),
        );
        errors.is_empty().then_some(()).ok_or(errors)?;
        Ok(IngredientChanges {
            name,
            measurement_unit: unit,
        })
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i64,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipePayload {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub ingredients: Vec<(Id, i32)>,
    pub tags: Vec<Id>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub ingredients: Option<Vec<(Id, i32)>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// Non-empty, no duplicate ids, every amount positive.
pub fn validate_ingredients(items: &[IngredientAmount]) -> Result<Vec<(Id, i32)>, String> {
    if items.is_empty() {
        return Err("At least one ingredient should be added.".to_owned());
    }

    let mut seen = HashSet::new();
    let mut ingredients = Vec::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err("Ingredients can't be duplicated.".to_owned());
        }
        if item.amount <= 0 {
            return Err("Ingredient amount should be more than 0.".to_owned());
        }
        let amount = i32::try_from(item.amount)
            .map_err(|_| "Ingredient amount is too large.".to_owned())?;
        ingredients.push((item.id, amount));
    }
    Ok(ingredients)
}

pub fn validate_tags(tags: &[Id]) -> Result<Vec<Id>, String> {
    if tags.is_empty() {
        return Err("At least one tag should be added.".to_owned());
    }
    let mut seen = HashSet::new();
    if tags.iter().any(|tag| !seen.insert(*tag)) {
        return Err("Tags can't be duplicated.".to_owned());
    }
    Ok(tags.to_vec())
}

pub fn validate_cooking_time(cooking_time: i64) -> Result<i32, String> {
    if cooking_time < 1 {
        return Err("Cooking time should be at least 1 minute.".to_owned());
    }
    i32::try_from(cooking_time).map_err(|_| "Cooking time is too large.".to_owned())
}

impl RecipePayload {
    pub fn validate_new(self) -> Result<NewRecipe, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, missing) in [
            ("ingredients", self.ingredients.is_none()),
            ("tags", self.tags.is_none()),
            ("image", self.image.is_none()),
            ("name", self.name.is_none()),
            ("text", self.text.is_none()),
            ("cooking_time", self.cooking_time.is_none()),
        ] {
            if missing {
                errors.add(field, REQUIRED);
            }
        }

        match self.validate_changes() {
            Ok(RecipeChanges {
                ingredients: Some(ingredients),
                tags: Some(tags),
                image: Some(image),
                name: Some(name),
                text: Some(text),
                cooking_time: Some(cooking_time),
            }) if errors.is_empty() => Ok(NewRecipe {
                ingredients,
                tags,
                image,
                name,
                text,
                cooking_time,
            }),
            Ok(_) => Err(errors),
            Err(more) => Err(merge(errors, more)),
        }
    }

    /// Absent fields stay untouched; present `ingredients`/`tags` must be a full valid set.
    pub fn validate_changes(self) -> Result<RecipeChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let ingredients = self.ingredients.as_deref().and_then(|items| {
            validate_ingredients(items)
                .map_err(|e| errors.add("ingredients", &e))
                .ok()
        });
        let tags = self
            .tags
            .as_deref()
            .and_then(|tags| validate_tags(tags).map_err(|e| errors.add("tags", &e)).ok());
        let image = optional_text(&mut errors, "image", self.image.as_deref(), None);
        let name = optional_text(&mut errors, "name", self.name.as_deref(), Some(NAME_MAX_LENGTH));
        let text = optional_text(&mut errors, "text", self.text.as_deref(), None);
        let cooking_time = self.cooking_time.and_then(|time| {
            validate_cooking_time(time)
                .map_err(|e| errors.add("cooking_time", &e))
                .ok()
        });

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(RecipeChanges {
            ingredients,
            tags,
            image,
            name,
            text,
            cooking_time,
        })
    }
}

fn merge(mut base: ValidationErrors, other: ValidationErrors) -> ValidationErrors {
    for (field, messages) in other.into_fields() {
        for message in messages {
            if !base.get(&field).is_some_and(|m| m.contains(&message)) {
                base.add(&field, &message);
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Id, amount: i64) -> IngredientAmount {
        IngredientAmount { id, amount }
    }

    fn recipe() -> RecipePayload {
        RecipePayload {
            ingredients: Some(vec![item(1, 10), item(2, 3)]),
            tags: Some(vec![1]),
            image: Some("data:image/png;base64,AAAA".to_owned()),
            name: Some("Pancakes".to_owned()),
            text: Some("Mix and fry.".to_owned()),
            cooking_time: Some(15),
        }
    }

    #[test]
    fn recipe_without_ingredients_is_rejected() {
        let payload = RecipePayload {
            ingredients: Some(vec![]),
            ..recipe()
        };
        let errors = payload.validate_new().unwrap_err();
        assert_eq!(
            errors.get("ingredients"),
            Some(&["At least one ingredient should be added.".to_owned()][..])
        );
    }

    #[test]
    fn duplicate_ingredients_are_rejected() {
        assert_eq!(
            validate_ingredients(&[item(1, 1), item(1, 2)]),
            Err("Ingredients can't be duplicated.".to_owned())
        );
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        for amount in [0, -5] {
            assert_eq!(
                validate_ingredients(&[item(1, amount)]),
                Err("Ingredient amount should be more than 0.".to_owned())
            );
        }
    }

    #[test]
    fn valid_recipe_passes() {
        let recipe = recipe().validate_new().unwrap();
        assert_eq!(recipe.ingredients, vec![(1, 10), (2, 3)]);
        assert_eq!(recipe.cooking_time, 15);
    }

    #[test]
    fn missing_fields_are_listed() {
        let errors = RecipePayload::default().validate_new().unwrap_err();
        for field in ["ingredients", "tags", "image", "name", "text", "cooking_time"] {
            assert_eq!(errors.get(field), Some(&[REQUIRED.to_owned()][..]), "{field}");
        }
    }

    #[test]
    fn tags_and_cooking_time_rules() {
        let payload = RecipePayload {
            tags: Some(vec![2, 2]),
            cooking_time: Some(0),
            ..recipe()
        };
        let errors = payload.validate_new().unwrap_err();
        assert!(errors.get("tags").is_some());
        assert!(errors.get("cooking_time").is_some());
    }

    #[test]
    fn partial_update_keeps_absent_fields() {
        let changes = RecipePayload {
            name: Some(" Waffles ".to_owned()),
            ..RecipePayload::default()
        }
        .validate_changes()
        .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Waffles"));
        assert!(changes.ingredients.is_none() && changes.tags.is_none() && changes.image.is_none());
    }

    #[test]
    fn user_fields_are_checked() {
        let payload = NewUserPayload {
            email: Some("not-an-email".to_owned()),
            username: Some("me".to_owned()),
            first_name: Some("Ann".to_owned()),
            last_name: Some(String::new()),
            password: None,
        };
        let errors = payload.validate().unwrap_err();
        for field in ["email", "username", "last_name", "password"] {
            assert!(errors.get(field).is_some(), "{field}");
        }
        assert!(errors.get("first_name").is_none());
    }

    #[test]
    fn valid_user_is_normalized() {
        let user = NewUserPayload {
            email: Some("Cook@Example.com".to_owned()),
            username: Some("cook.master".to_owned()),
            first_name: Some("Ann".to_owned()),
            last_name: Some("Lee".to_owned()),
            password: Some("s3cret pass".to_owned()),
        }
        .validate()
        .unwrap();
        assert_eq!(user.email, "cook@example.com");
        assert_eq!(user.password, "s3cret pass");
    }

    #[test]
    fn username_characters() {
        assert!(validate_username("anna_b+1@x.y-z").is_ok());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("ME").is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_color("#49B64E").is_ok());
        assert!(validate_color("49B64E").is_err());
        assert!(validate_color("#49B64G").is_err());
        assert!(validate_slug("quick-lunch_1").is_ok());
        assert!(validate_slug("quick lunch").is_err());

        let errors = TagPayload {
            name: Some("Lunch".to_owned()),
            color: None,
            slug: Some("lunch".to_owned()),
        }
        .validate_new()
        .unwrap_err();
        assert_eq!(errors.get("color"), Some(&[REQUIRED.to_owned()][..]));
    }

    #[test]
    fn ingredient_requires_both_fields() {
        let errors = IngredientPayload {
            name: Some("Flour".to_owned()),
            measurement_unit: None,
        }
        .validate_new()
        .unwrap_err();
        assert!(errors.get("measurement_unit").is_some());
    }
}
