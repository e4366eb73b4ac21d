use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// Page row for author listings, `count` carrying `COUNT(*) OVER()`.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,

    pub count: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password: row.password,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub author_id: Uuid,
    pub pub_date: DateTime<Utc>,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub author_id: Uuid,
    pub pub_date: DateTime<Utc>,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,

    pub count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: row.id,
            name: row.name,
            author_id: row.author_id,
            pub_date: row.pub_date,
            text: row.text,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// Tag joined through `recipe_tags`, keyed back to its recipe.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

/// Ingredient joined through `recipe_ingredients`, keyed back to its recipe.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientRow> for IngredientAmount {
    fn from(row: RecipeIngredientRow) -> Self {
        IngredientAmount {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ShortRecipe {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// Short recipe keyed to its author, for batched subscription listings.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub author_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<AuthorRecipeRow> for ShortRecipe {
    fn from(row: AuthorRecipeRow) -> Self {
        ShortRecipe {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// One (ingredient, unit, amount) triple pulled out of a shopping list.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ShoplistRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoplistItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        UserView {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}
