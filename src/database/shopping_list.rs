use sqlx::{Pool, Postgres};

use crate::{
    constants::SHOPPING_LIST_TITLE,
    error::ApiError,
    schema::{Id, ShoppingListItem},
};

/// Ingredients of every recipe in the user's cart, summed per (name, unit).
pub async fn fetch_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, ApiError> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount)::BIGINT AS amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> Result<String, ApiError> {
    if items.is_empty() {
        return Err(ApiError::bad_request("Shopping cart is empty."));
    }

    let mut text = format!("{SHOPPING_LIST_TITLE}\n\n");
    for (n, item) in items.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} ({}): {}\n",
            n + 1,
            item.name,
            item.measurement_unit,
            item.amount
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, amount: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
            amount,
        }
    }

    #[test]
    fn renders_numbered_lines() {
        let text = render_shopping_list(&[item("flour", "g", 500), item("milk", "ml", 250)]).unwrap();
        assert_eq!(
            text,
            "Shopping list\n\n1. flour (g): 500\n2. milk (ml): 250\n"
        );
    }

    #[test]
    fn empty_cart_is_an_error() {
        match render_shopping_list(&[]) {
            Err(ApiError::BadRequest(info)) => assert_eq!(info, "Shopping cart is empty."),
            other => panic!("unexpected {other:?}"),
        }
    }
}
