use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
    pub date_joined: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A user as seen by someone else; `is_subscribed` is relative to the viewer.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub account: UserAccount,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserProfileRow {
    #[sqlx(flatten)]
    pub profile: UserProfile,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Id,
    #[sqlx(flatten)]
    pub tag: Tag,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

/// Ingredient as it appears inside a recipe, carrying the amount.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Id,
    #[sqlx(flatten)]
    pub ingredient: RecipeIngredient,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,

    pub author_id: Id,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

impl RecipeRow {
    pub fn author(&self) -> UserProfile {
        UserProfile {
            account: UserAccount {
                email: self.author_email.to_owned(),
                id: self.author_id,
                username: self.author_username.to_owned(),
                first_name: self.author_first_name.to_owned(),
                last_name: self.author_last_name.to_owned(),
            },
            is_subscribed: self.author_is_subscribed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeShortRow {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub author_id: Id,
    #[sqlx(flatten)]
    pub recipe: RecipeShortRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeShort {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// A followed author together with a preview of their recipes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Serialize, Debug)]
pub struct AuthToken {
    pub auth_token: String,
}
