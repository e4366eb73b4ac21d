use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::{
    document::pdf::{as_attachment, render_shopping_list},
    error::{map_unique_violation, ConflictError, Error, NotFoundError, QueryError},
    schema::{ShoplistItem, ShoplistRow, ShortRecipe, Uuid},
};

use super::get_recipe;

pub async fn add_to_shoplist(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(NotFoundError::RecipeNotFound)?;

    let result = sqlx::query(
        "INSERT INTO shoplist_recipes (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, ConflictError::AlreadyInShoplist))?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::AlreadyInShoplist.into());
    }

    Ok(ShortRecipe {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_shoplist(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(NotFoundError::RecipeNotFound)?;

    let result = sqlx::query("DELETE FROM shoplist_recipes WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::NotInShoplist.into());
    }

    Ok(ShortRecipe {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

/// Every (ingredient, unit, amount) triple behind the user's shopping list,
/// one join across all queued recipes.
async fn list_shoplist_rows(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoplistRow>, Error> {
    let rows: Vec<ShoplistRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shoplist_recipes s
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = s.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE s.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Groups triples by (name, unit) and sums the amounts. Ordering by
/// ingredient name ascending falls out of the map key.
pub fn merge_shoplist_rows(rows: Vec<ShoplistRow>) -> Vec<ShoplistItem> {
    let mut groups: BTreeMap<(String, String), i64> = BTreeMap::new();
    for row in rows {
        *groups
            .entry((row.name, row.measurement_unit))
            .or_insert(0) += row.amount as i64;
    }

    groups
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoplistItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// The consolidated shopping list. An empty shoplist is an empty list, not
/// an error.
pub async fn aggregate_shoplist(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoplistItem>, Error> {
    let rows = list_shoplist_rows(user_id, pool).await?;
    Ok(merge_shoplist_rows(rows))
}

/// Aggregates, renders and wraps the printable document as a download
/// attachment.
pub async fn export_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<warp::reply::Response, Error> {
    let items = aggregate_shoplist(user_id, pool).await?;
    log::debug!("exporting shopping list of {} items for user {user_id}", items.len());

    let document = render_shopping_list(&items)?;
    as_attachment(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> ShoplistRow {
        ShoplistRow {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    #[test]
    fn amounts_sum_within_a_group() {
        let items = merge_shoplist_rows(vec![row("Sugar", "g", 100), row("Sugar", "g", 50)]);
        assert_eq!(
            items,
            vec![ShoplistItem {
                name: "Sugar".into(),
                measurement_unit: "g".into(),
                total_amount: 150,
            }]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = merge_shoplist_rows(vec![
            row("Milk", "ml", 200),
            row("Milk", "tbsp", 2),
            row("Milk", "ml", 300),
        ]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "ml");
        assert_eq!(items[0].total_amount, 500);
        assert_eq!(items[1].measurement_unit, "tbsp");
    }

    #[test]
    fn groups_come_out_name_ascending() {
        let items = merge_shoplist_rows(vec![
            row("Salt", "g", 5),
            row("Butter", "g", 20),
            row("Flour", "g", 400),
        ]);
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Butter", "Flour", "Salt"]);
    }

    #[test]
    fn empty_shoplist_aggregates_to_nothing() {
        assert!(merge_shoplist_rows(vec![]).is_empty());
    }
}
