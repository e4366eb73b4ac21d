use serde::Deserialize;

use crate::schema::Uuid;

/// Incoming recipe payload. The image arrives as an inline
/// `data:image/..;base64,` url; storage of the decoded bytes happens
/// elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<RecipeIngredientForm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientForm {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagForm {
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Listing filters consumed from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub recipes_limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_payload_deserializes() {
        let form: RecipeForm = serde_json::from_value(serde_json::json!({
            "name": "Korvapuustit",
            "text": "Pullataikina, kaneli, voi.",
            "cooking_time": 45,
            "image": "data:image/png;base64,aGVsbG8=",
            "tags": [5, 6],
            "ingredients": [{"id": 1, "amount": 2}, {"id": 2, "amount": 3}],
        }))
        .unwrap();

        assert_eq!(form.tags, vec![5, 6]);
        assert_eq!(form.ingredients.len(), 2);
        assert_eq!(form.ingredients[1].amount, 3);
    }

    #[test]
    fn filter_fields_default_to_off() {
        let filter: RecipeFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(filter.author.is_none());
        assert!(filter.tags.is_empty());
        assert!(!filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }
}
