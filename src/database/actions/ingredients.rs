use sqlx::{Pool, Postgres};

use crate::{
    error::{ConflictError, Error, QueryError},
    form::IngredientForm,
    schema::{Ingredient, Uuid},
};

/// Reference-data listing, optionally narrowed to a case-insensitive name
/// prefix.
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match name {
        Some(prefix) => {
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                .bind(format!("{prefix}%"))
                .fetch_all(pool)
                .await
                .map_err(QueryError::from)?
        }
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// The (name, measurement unit) pair is unique; a second insert of the same
/// pair reports as a conflict.
pub async fn create_ingredient(
    form: &IngredientForm,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&form.name)
    .bind(&form.measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ConflictError::IngredientExists.into())
}
