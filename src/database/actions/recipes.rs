use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    annotate::build_recipe_views,
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::{Error, NotFoundError, QueryError},
    form::{RecipeFilter, RecipeForm, RecipeIngredientForm},
    jwt::SessionData,
    pagination::PageContext,
    schema::{Recipe, RecipeRow, RecipeView, Uuid},
    validate::{validate_name, validate_recipe_form},
};

/// Paginated listing, newest first. Filters compose; the favorited and
/// shopping-cart filters silently do nothing for anonymous users.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    acting_user: Option<Uuid>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(&filter.tags)
            .push("))");
    }
    if filter.is_favorited {
        if let Some(user_id) = acting_user {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM favorite_recipes f \
                     WHERE f.recipe_id = r.id AND f.user_id = ",
                )
                .push_bind(user_id)
                .push(")");
        }
    }
    if filter.is_in_shopping_cart {
        if let Some(user_id) = acting_user {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM shoplist_recipes s \
                     WHERE s.recipe_id = r.id AND s.user_id = ",
                )
                .push_bind(user_id)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.get(0).map(|row| row.count).unwrap_or(0);
    let recipes: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();
    let views = build_recipe_views(recipes, acting_user, pool).await?;

    Ok(PageContext::from_rows(
        views,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_view(
    id: Uuid,
    acting_user: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(NotFoundError::RecipeNotFound)?;

    build_recipe_views(vec![recipe], acting_user, pool)
        .await?
        .pop()
        .ok_or_else(|| QueryError::new("annotated view went missing".to_owned()).into())
}

/// Resolves a recipe for modification: the session must be allowed to manage
/// its own recipes, and anything beyond the caller's own rows needs the
/// manage-all grant.
pub async fn get_recipe_mut(
    id: Uuid,
    session: SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::Unauthorized(
                        "only the author may modify this recipe".into(),
                    ))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(NotFoundError::RecipeNotFound.into()),
    }
}

async fn recipe_name_exists(
    author_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: (bool,) = match exclude {
        Some(id) => sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM recipes WHERE author_id = $1 AND name = $2 AND id <> $3)",
        )
        .bind(author_id)
        .bind(name)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM recipes WHERE author_id = $1 AND name = $2)",
        )
        .bind(author_id)
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?,
    };

    Ok(row.0)
}

async fn ensure_tags_exist(tags: &[Uuid], pool: &Pool<Postgres>) -> Result<(), Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    if row.0 != tags.len() as i64 {
        return Err(NotFoundError::TagNotFound.into());
    }
    Ok(())
}

async fn ensure_ingredients_exist(ingredients: &[Uuid], pool: &Pool<Postgres>) -> Result<(), Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(ingredients)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    if row.0 != ingredients.len() as i64 {
        return Err(NotFoundError::IngredientNotFound.into());
    }
    Ok(())
}

async fn insert_ingredient_rows(
    recipe_id: Uuid,
    ingredients: &[RecipeIngredientForm],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(ingredients.iter(), |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;
    Ok(())
}

async fn insert_tag_rows(
    recipe_id: Uuid,
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags.iter(), |mut b, tag| {
        b.push_bind(recipe_id).push_bind(*tag);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;
    Ok(())
}

/// Validates the submission, then writes the recipe and both join sets in
/// one transaction. The publish timestamp is set here and never touched
/// again.
pub async fn create_recipe(
    form: &RecipeForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe_form(form)?;

    let name_taken = recipe_name_exists(session.user_id, &form.name, None, pool).await?;
    validate_name(&form.name, None, name_taken)?;

    ensure_tags_exist(&form.tags, pool).await?;
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|item| item.id).collect();
    ensure_ingredients_exist(&ingredient_ids, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let recipe: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (name, author_id, pub_date, text, image, cooking_time)
        VALUES ($1, $2, NOW(), $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(&form.name)
    .bind(session.user_id)
    .bind(&form.text)
    .bind(&form.image)
    .bind(form.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_ingredient_rows(recipe.0, &form.ingredients, &mut tr).await?;
    insert_tag_rows(recipe.0, &form.tags, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    get_recipe_view(recipe.0, Some(session.user_id), pool).await
}

/// Full replacement of the editable fields and both join sets. The clear
/// and reinsert happen inside one transaction so a half-replaced ingredient
/// list is never visible.
pub async fn update_recipe(
    id: Uuid,
    form: &RecipeForm,
    session: SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe_mut(id, session.clone(), pool).await?;
    validate_recipe_form(form)?;

    let name_taken = recipe_name_exists(recipe.author_id, &form.name, Some(recipe.id), pool).await?;
    validate_name(&form.name, Some(&recipe.name), name_taken)?;

    ensure_tags_exist(&form.tags, pool).await?;
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|item| item.id).collect();
    ensure_ingredients_exist(&ingredient_ids, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5")
        .bind(&form.name)
        .bind(&form.text)
        .bind(&form.image)
        .bind(form.cooking_time)
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_ingredient_rows(id, &form.ingredients, &mut tr).await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_tag_rows(id, &form.tags, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    get_recipe_view(id, Some(session.user_id), pool).await
}

pub async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    sqlx::query("DELETE FROM favorite_recipes WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM shoplist_recipes WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;
    Ok(())
}
