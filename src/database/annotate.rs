use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres};

use crate::error::{Error, QueryError};
use crate::schema::{
    AuthorRecipeRow, Recipe, RecipeIngredientRow, RecipeTagRow, RecipeView, ShortRecipe,
    SubscriptionView, User, UserView, Uuid,
};

/// Recipe ids among `recipe_ids` the user has favorited, in one query.
pub async fn favorited_recipe_ids(
    user_id: Uuid,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM favorite_recipes WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Recipe ids among `recipe_ids` currently in the user's shopping list.
pub async fn shoplisted_recipe_ids(
    user_id: Uuid,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM shoplist_recipes WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Author ids among `author_ids` the user follows.
pub async fn followed_author_ids(
    user_id: Uuid,
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, Error> {
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM follows WHERE follower_id = $1 AND author_id = ANY($2)",
    )
    .bind(user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn recipe_counts_by_author(
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, i64>, Error> {
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().collect())
}

/// Newest `limit` short recipes per author, batched over the whole id list.
pub async fn recent_recipes_by_author(
    author_ids: &[Uuid],
    limit: i64,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<ShortRecipe>>, Error> {
    if author_ids.is_empty() || limit <= 0 {
        return Ok(HashMap::new());
    }

    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM recipes
        WHERE author_id = ANY($1)
        ORDER BY pub_date DESC
    ",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(group_author_recipes(rows, limit as usize))
}

fn group_author_recipes(
    rows: Vec<AuthorRecipeRow>,
    limit: usize,
) -> HashMap<Uuid, Vec<ShortRecipe>> {
    let mut grouped: HashMap<Uuid, Vec<ShortRecipe>> = HashMap::new();
    for row in rows {
        let recipes = grouped.entry(row.author_id).or_default();
        if recipes.len() < limit {
            recipes.push(row.into());
        }
    }
    grouped
}

/// Decorates a page of recipes with tags, ingredient lists, author profiles
/// and the acting user's membership flags. Round-trip count stays constant
/// no matter how many rows the page holds; an anonymous user costs no
/// membership queries at all.
pub async fn build_recipe_views(
    recipes: Vec<Recipe>,
    acting_user: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let tag_rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let ingredient_rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name,
               i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let author_rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(&author_ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;
    let authors: HashMap<Uuid, User> = author_rows
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    let (favorited, shoplisted, followed) = match acting_user {
        Some(user_id) => (
            favorited_recipe_ids(user_id, &recipe_ids, pool).await?,
            shoplisted_recipe_ids(user_id, &recipe_ids, pool).await?,
            followed_author_ids(user_id, &author_ids, pool).await?,
        ),
        None => (HashSet::new(), HashSet::new(), HashSet::new()),
    };

    let mut tags_by_recipe: HashMap<Uuid, Vec<RecipeTagRow>> = HashMap::new();
    for row in tag_rows {
        tags_by_recipe.entry(row.recipe_id).or_default().push(row);
    }
    let mut ingredients_by_recipe: HashMap<Uuid, Vec<RecipeIngredientRow>> = HashMap::new();
    for row in ingredient_rows {
        ingredients_by_recipe
            .entry(row.recipe_id)
            .or_default()
            .push(row);
    }

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors
            .get(&recipe.author_id)
            .cloned()
            .ok_or_else(|| QueryError::new(format!("recipe {} has no author row", recipe.id)))?;

        views.push(RecipeView {
            id: recipe.id,
            tags: tags_by_recipe
                .remove(&recipe.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            author: UserView::from_user(author.clone(), followed.contains(&author.id)),
            ingredients: ingredients_by_recipe
                .remove(&recipe.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: shoplisted.contains(&recipe.id),
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        });
    }

    Ok(views)
}

/// Profile representation with the acting user's follow flag.
pub async fn build_user_view(
    user: User,
    acting_user: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserView, Error> {
    let is_subscribed = match acting_user {
        Some(follower) => followed_author_ids(follower, &[user.id], pool)
            .await?
            .contains(&user.id),
        None => false,
    };

    Ok(UserView::from_user(user, is_subscribed))
}

/// Subscription entries for a batch of authors: follow flag, recipe count
/// and the newest `recipes_limit` short recipes, three queries total.
pub async fn build_subscription_views(
    authors: Vec<User>,
    recipes_limit: i64,
    is_subscribed: bool,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionView>, Error> {
    let author_ids: Vec<Uuid> = authors.iter().map(|author| author.id).collect();
    let counts = recipe_counts_by_author(&author_ids, pool).await?;
    let mut recents = recent_recipes_by_author(&author_ids, recipes_limit, pool).await?;

    Ok(authors
        .into_iter()
        .map(|author| SubscriptionView {
            email: author.email,
            id: author.id,
            username: author.username,
            first_name: author.first_name,
            last_name: author.last_name,
            is_subscribed,
            recipes: recents.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(author_id: Uuid, id: Uuid) -> AuthorRecipeRow {
        AuthorRecipeRow {
            author_id,
            id,
            name: format!("recipe-{id}"),
            image: String::new(),
            cooking_time: 10,
        }
    }

    #[test]
    fn grouping_keeps_arrival_order_and_truncates_per_author() {
        // rows arrive newest-first from the query
        let rows = vec![row(1, 10), row(2, 20), row(1, 11), row(1, 12), row(1, 13)];
        let grouped = group_author_recipes(rows, 3);

        let first: Vec<Uuid> = grouped[&1].iter().map(|recipe| recipe.id).collect();
        assert_eq!(first, vec![10, 11, 12]);
        assert_eq!(grouped[&2].len(), 1);
    }

    #[test]
    fn zero_limit_groups_nothing() {
        let grouped = group_author_recipes(vec![row(1, 10)], 0);
        assert!(grouped[&1].is_empty());
    }
}
