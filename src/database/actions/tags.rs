use sqlx::{Pool, Postgres};

use crate::{
    error::{ConflictError, Error, QueryError},
    form::TagForm,
    schema::{Tag, Uuid},
    validate::validate_tag_form,
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Name, color and slug are each unique; color and slug also have to match
/// their format rules before the row is attempted.
pub async fn create_tag(form: &TagForm, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    validate_tag_form(form)?;

    let row: Option<Tag> = sqlx::query_as(
        "
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&form.name)
    .bind(&form.color)
    .bind(&form.slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ConflictError::TagExists.into())
}
