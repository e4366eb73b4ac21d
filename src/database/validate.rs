use std::collections::HashSet;
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;

use crate::constants::FORBIDDEN_USERNAMES;
use crate::error::ValidationError;
use crate::form::{RecipeForm, RecipeIngredientForm, TagForm, UserForm};
use crate::schema::Uuid;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}){1,2}$").expect("valid color pattern"));
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));

/// Rejects an empty ingredient list and any ingredient id listed twice.
pub fn validate_ingredients(ingredients: &[RecipeIngredientForm]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::EmptyIngredientList);
    }

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut duplicated: Vec<Uuid> = vec![];
    for ingredient in ingredients {
        if !seen.insert(ingredient.id) && !duplicated.contains(&ingredient.id) {
            duplicated.push(ingredient.id);
        }
    }

    if !duplicated.is_empty() {
        return Err(ValidationError::DuplicateIngredient(duplicated));
    }
    Ok(())
}

pub fn validate_tags(tags: &[Uuid]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::EmptyTagList);
    }

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut duplicated: Vec<Uuid> = vec![];
    for tag in tags {
        if !seen.insert(*tag) && !duplicated.contains(tag) {
            duplicated.push(*tag);
        }
    }

    if !duplicated.is_empty() {
        return Err(ValidationError::DuplicateTag(duplicated));
    }
    Ok(())
}

/// Per-author recipe-name uniqueness. `previous_name` is the name the
/// in-flight instance already carries; an update that keeps it skips the
/// check entirely. `name_taken` is the author-scoped existence result the
/// action layer computed.
pub fn validate_name(
    name: &str,
    previous_name: Option<&str>,
    name_taken: bool,
) -> Result<(), ValidationError> {
    if previous_name == Some(name) {
        return Ok(());
    }
    if name_taken {
        return Err(ValidationError::DuplicateRecipeName(name.to_string()));
    }
    Ok(())
}

/// Field rules plus the ingredient/tag composition checks, everything a
/// recipe submission must pass before any row is written.
pub fn validate_recipe_form(form: &RecipeForm) -> Result<(), ValidationError> {
    if form.cooking_time < 1 {
        return Err(ValidationError::InvalidCookingTime);
    }

    validate_ingredients(&form.ingredients)?;
    validate_tags(&form.tags)?;

    for ingredient in &form.ingredients {
        if ingredient.amount < 1 {
            return Err(ValidationError::InvalidIngredientAmount(ingredient.id));
        }
    }

    validate_image(&form.image)?;
    Ok(())
}

pub fn validate_tag_form(form: &TagForm) -> Result<(), ValidationError> {
    if !form.color.is_empty() && !COLOR_RE.is_match(&form.color) {
        return Err(ValidationError::InvalidTagColor);
    }
    if !SLUG_RE.is_match(&form.slug) {
        return Err(ValidationError::InvalidTagSlug);
    }
    Ok(())
}

pub fn validate_user_form(form: &UserForm) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(&form.username)
        || FORBIDDEN_USERNAMES
            .iter()
            .any(|forbidden| form.username.eq_ignore_ascii_case(forbidden))
    {
        return Err(ValidationError::InvalidUsername(form.username.clone()));
    }

    let mut parts = form.email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// The image must be an inline data url whose base64 payload decodes.
fn validate_image(image: &str) -> Result<(), ValidationError> {
    let payload = image
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or(ValidationError::InvalidImage)?;

    STANDARD
        .decode(payload)
        .map_err(|_| ValidationError::InvalidImage)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: Uuid, amount: i32) -> RecipeIngredientForm {
        RecipeIngredientForm { id, amount }
    }

    fn form() -> RecipeForm {
        RecipeForm {
            name: "Hernekeitto".into(),
            text: "Keitä herneet.".into(),
            cooking_time: 90,
            image: "data:image/png;base64,aGVsbG8=".into(),
            tags: vec![5, 6],
            ingredients: vec![ingredient(1, 2), ingredient(2, 3)],
        }
    }

    #[test]
    fn repeated_ingredient_id_is_named() {
        let result = validate_ingredients(&[ingredient(1, 2), ingredient(2, 1), ingredient(1, 5)]);
        assert_eq!(result, Err(ValidationError::DuplicateIngredient(vec![1])));
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert_eq!(
            validate_ingredients(&[]),
            Err(ValidationError::EmptyIngredientList)
        );
    }

    #[test]
    fn repeated_tag_id_is_named() {
        assert_eq!(
            validate_tags(&[5, 6, 5, 6]),
            Err(ValidationError::DuplicateTag(vec![5, 6]))
        );
        assert_eq!(validate_tags(&[]), Err(ValidationError::EmptyTagList));
    }

    #[test]
    fn taken_name_is_rejected_on_create() {
        assert_eq!(
            validate_name("Hernekeitto", None, true),
            Err(ValidationError::DuplicateRecipeName("Hernekeitto".into()))
        );
        assert_eq!(validate_name("Hernekeitto", None, false), Ok(()));
    }

    #[test]
    fn unchanged_name_skips_the_uniqueness_check() {
        assert_eq!(validate_name("Hernekeitto", Some("Hernekeitto"), true), Ok(()));
        assert_eq!(
            validate_name("Hernekeitto", Some("Kalakeitto"), true),
            Err(ValidationError::DuplicateRecipeName("Hernekeitto".into()))
        );
    }

    #[test]
    fn cooking_time_and_amounts_must_be_positive() {
        let mut short = form();
        short.cooking_time = 0;
        assert_eq!(
            validate_recipe_form(&short),
            Err(ValidationError::InvalidCookingTime)
        );

        let mut zero_amount = form();
        zero_amount.ingredients[1].amount = 0;
        assert_eq!(
            validate_recipe_form(&zero_amount),
            Err(ValidationError::InvalidIngredientAmount(2))
        );

        assert_eq!(validate_recipe_form(&form()), Ok(()));
    }

    #[test]
    fn image_must_be_a_decodable_data_url() {
        let mut broken = form();
        broken.image = "https://example.com/cat.png".into();
        assert_eq!(
            validate_recipe_form(&broken),
            Err(ValidationError::InvalidImage)
        );

        broken.image = "data:image/png;base64,!!!".into();
        assert_eq!(
            validate_recipe_form(&broken),
            Err(ValidationError::InvalidImage)
        );
    }

    #[test]
    fn tag_color_and_slug_rules() {
        let tag = TagForm {
            name: "Aamiainen".into(),
            color: "#00FF00".into(),
            slug: "aamiainen".into(),
        };
        assert_eq!(validate_tag_form(&tag), Ok(()));

        let mut empty_color = tag.clone();
        empty_color.color = String::new();
        assert_eq!(validate_tag_form(&empty_color), Ok(()));

        let mut bad_color = tag.clone();
        bad_color.color = "green".into();
        assert_eq!(validate_tag_form(&bad_color), Err(ValidationError::InvalidTagColor));

        let mut bad_slug = tag;
        bad_slug.slug = "aamiainen!".into();
        assert_eq!(validate_tag_form(&bad_slug), Err(ValidationError::InvalidTagSlug));
    }

    #[test]
    fn username_me_is_forbidden_in_any_case() {
        for username in ["me", "Me", "ME"] {
            let user = UserForm {
                username: username.into(),
                email: "user@example.com".into(),
                first_name: "Maija".into(),
                last_name: "Meikäläinen".into(),
                password: "hunter2".into(),
            };
            assert_eq!(
                validate_user_form(&user),
                Err(ValidationError::InvalidUsername(username.into()))
            );
        }
    }
}
