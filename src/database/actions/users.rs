use sqlx::{Pool, Postgres};

use crate::{
    annotate::build_user_view,
    cryptography::{hash_password, verify_password},
    error::{ConflictError, Error, NotFoundError, QueryError},
    form::UserForm,
    jwt::generate_jwt_session,
    schema::{User, UserRole, UserView, Uuid},
    validate::validate_user_form,
};

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user after username/email validation. The stored password is
/// the argon2 hash, never the submitted text.
pub async fn register_user(form: &UserForm, pool: &Pool<Postgres>) -> Result<User, Error> {
    validate_user_form(form)?;

    let password = hash_password(form.password.clone())
        .map_err(|e| QueryError::new(format!("failed to hash password: {e}")))?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&form.username)
    .bind(&form.email)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .bind(UserRole::User)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ConflictError::UserExists.into())
}

pub async fn login_user(
    username: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user(pool, username)
        .await?
        .ok_or_else(|| Error::Unauthorized("invalid credentials".into()))?;

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| Error::Unauthorized("invalid credentials".into()))?;
    if !authenticated {
        return Err(Error::Unauthorized("invalid credentials".into()));
    }

    Ok(generate_jwt_session(&user))
}

/// Profile with the acting user's follow flag attached.
pub async fn get_user_view(
    id: Uuid,
    acting_user: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserView, Error> {
    let user = get_user_by_id(pool, id)
        .await?
        .ok_or(NotFoundError::UserNotFound)?;

    build_user_view(user, acting_user, pool).await
}
