use sqlx::{Pool, Postgres};

use crate::{
    error::{map_unique_violation, ConflictError, Error, NotFoundError, QueryError},
    schema::{ShortRecipe, Uuid},
};

use super::get_recipe;

/// Marks a recipe as the user's favorite. The insert itself is the
/// duplicate check; a row that already exists (or races in concurrently)
/// reports as already favorited.
pub async fn add_to_favorites(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(NotFoundError::RecipeNotFound)?;

    let result = sqlx::query(
        "INSERT INTO favorite_recipes (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, ConflictError::AlreadyFavorited))?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::AlreadyFavorited.into());
    }

    Ok(ShortRecipe {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_favorites(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(NotFoundError::RecipeNotFound)?;

    let result = sqlx::query("DELETE FROM favorite_recipes WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::NotFavorited.into());
    }

    Ok(ShortRecipe {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}
