use sqlx::{Pool, Postgres};

use crate::{
    annotate::build_subscription_views,
    constants::{RECIPES_LIMIT_DEFAULT, RECIPES_LIMIT_MAX, SUBSCRIPTION_COUNT_PER_PAGE},
    error::{map_unique_violation, ConflictError, Error, NotFoundError, QueryError},
    form::SubscriptionQuery,
    pagination::PageContext,
    schema::{SubscriptionView, User, UserRow, Uuid},
};

use super::get_user_by_id;

/// `recipes_limit` is client-controlled; clamp it so one query parameter
/// can't blow up the response.
pub fn clamp_recipes_limit(recipes_limit: Option<i64>) -> i64 {
    recipes_limit
        .unwrap_or(RECIPES_LIMIT_DEFAULT)
        .clamp(0, RECIPES_LIMIT_MAX)
}

/// Follows an author. Self-follows never reach the storage layer.
pub async fn subscribe(
    follower: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    if follower == author_id {
        return Err(ConflictError::SelfFollow.into());
    }

    let author = get_user_by_id(pool, author_id)
        .await?
        .ok_or(NotFoundError::UserNotFound)?;

    let result = sqlx::query(
        "INSERT INTO follows (follower_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(follower)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, ConflictError::AlreadyFollowing))?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::AlreadyFollowing.into());
    }

    let mut views =
        build_subscription_views(vec![author], clamp_recipes_limit(recipes_limit), true, pool)
            .await?;
    views
        .pop()
        .ok_or_else(|| QueryError::new("subscription view went missing".to_owned()).into())
}

pub async fn unsubscribe(
    follower: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    let author = get_user_by_id(pool, author_id)
        .await?
        .ok_or(NotFoundError::UserNotFound)?;

    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND author_id = $2")
        .bind(follower)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::NotFollowing.into());
    }

    let mut views =
        build_subscription_views(vec![author], clamp_recipes_limit(None), false, pool).await?;
    views
        .pop()
        .ok_or_else(|| QueryError::new("subscription view went missing".to_owned()).into())
}

/// Paginated listing of the authors the user follows, each carrying its
/// recipe count and newest short recipes.
pub async fn fetch_subscriptions(
    follower: Uuid,
    query: &SubscriptionQuery,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.follower_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(follower)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(query.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.get(0).map(|row| row.count).unwrap_or(0);
    let authors: Vec<User> = rows.into_iter().map(User::from).collect();
    let views =
        build_subscription_views(authors, clamp_recipes_limit(query.recipes_limit), true, pool)
            .await?;

    Ok(PageContext::from_rows(
        views,
        total_count,
        SUBSCRIPTION_COUNT_PER_PAGE,
        query.offset,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_limit_defaults_and_clamps() {
        assert_eq!(clamp_recipes_limit(None), RECIPES_LIMIT_DEFAULT);
        assert_eq!(clamp_recipes_limit(Some(10)), 10);
        assert_eq!(clamp_recipes_limit(Some(100_000)), RECIPES_LIMIT_MAX);
        assert_eq!(clamp_recipes_limit(Some(-4)), 0);
    }
}
