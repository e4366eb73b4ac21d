use crate::schema::Uuid;

/// Malformed submission, rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("recipe lists duplicate ingredient ids: {0:?}")]
    DuplicateIngredient(Vec<Uuid>),
    #[error("recipe lists duplicate tag ids: {0:?}")]
    DuplicateTag(Vec<Uuid>),
    #[error("you already have a recipe named \"{0}\"")]
    DuplicateRecipeName(String),
    #[error("a recipe needs at least one ingredient")]
    EmptyIngredientList,
    #[error("a recipe needs at least one tag")]
    EmptyTagList,
    #[error("cooking time must be at least one minute")]
    InvalidCookingTime,
    #[error("amount of ingredient {0} must be at least one")]
    InvalidIngredientAmount(Uuid),
    #[error("tag color must be a hex code like #RRGGBB")]
    InvalidTagColor,
    #[error("tag slug may only contain latin letters, digits, dashes and underscores")]
    InvalidTagSlug,
    #[error("username \"{0}\" is not allowed")]
    InvalidUsername(String),
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("image must be an inline base64-encoded data url")]
    InvalidImage,
}

/// Attempted duplicate relationship, no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("recipe is already in your favorites")]
    AlreadyFavorited,
    #[error("recipe is already in your shopping list")]
    AlreadyInShoplist,
    #[error("you already follow this author")]
    AlreadyFollowing,
    #[error("you cannot follow yourself")]
    SelfFollow,
    #[error("an ingredient with this name and measurement unit already exists")]
    IngredientExists,
    #[error("a tag with this name, color or slug already exists")]
    TagExists,
    #[error("username or email is already registered")]
    UserExists,
}

/// Removal or lookup of something that isn't there, no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("recipe is not in your favorites")]
    NotFavorited,
    #[error("recipe is not in your shopping list")]
    NotInShoplist,
    #[error("you don't follow this author")]
    NotFollowing,
    #[error("no recipe exists with the specified id")]
    RecipeNotFound,
    #[error("no user exists with the specified id")]
    UserNotFound,
    #[error("no tag exists with the specified id")]
    TagNotFound,
    #[error("no ingredient exists with the specified id")]
    IngredientNotFound,
}

#[derive(Debug, thiserror::Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to render document: {0}")]
    Document(String),
}

impl Error {
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::NotFound(_) => 404,
            Error::InvalidSession(_) => 401,
            Error::Unauthorized(_) => 403,
            Error::Query(_) | Error::Document(_) => 500,
        }
    }
}

impl warp::reject::Reject for Error {}

/// Maps a storage-level unique violation onto the conflict the caller was
/// guarding against; a concurrent duplicate insert surfaces as "already
/// exists" instead of a generic failure.
pub fn map_unique_violation(value: sqlx::Error, conflict: ConflictError) -> Error {
    if let sqlx::Error::Database(ref e) = value {
        if matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            log::warn!("unique violation raced past a pre-check: {conflict}");
            return Error::Conflict(conflict);
        }
    }
    Error::Query(QueryError::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(Error::from(ValidationError::EmptyTagList).status(), 400);
        assert_eq!(Error::from(ConflictError::SelfFollow).status(), 409);
        assert_eq!(Error::from(NotFoundError::RecipeNotFound).status(), 404);
        assert_eq!(Error::Unauthorized("nope".into()).status(), 403);
        assert_eq!(
            Error::Query(QueryError::new("broken".into())).status(),
            500
        );
    }

    #[test]
    fn duplicate_ingredient_message_names_the_ids() {
        let error = ValidationError::DuplicateIngredient(vec![3, 7]);
        let message = error.to_string();
        assert!(message.contains('3'));
        assert!(message.contains('7'));
    }
}
