use csv::{ReaderBuilder, Trim};
use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, ValidationErrors},
    schema::{Id, Ingredient},
    validation::IngredientChanges,
};

/// Escapes `LIKE` wildcards so user input only matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive prefix search on the name; `None` lists everything.
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => {
            sqlx::query_as(
                "SELECT * FROM ingredients WHERE LOWER(name) LIKE LOWER($1) || '%' ORDER BY name, id",
            )
            .bind(escape_like(name))
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn create_ingredient(
    changes: &IngredientChanges,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING *
    ",
    )
    .bind(&changes.name)
    .bind(&changes.measurement_unit)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| {
        ValidationErrors::single("name", "Ingredient with this name and measurement unit already exists.")
            .into()
    })
}

pub async fn update_ingredient(
    id: Id,
    changes: &IngredientChanges,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        UPDATE ingredients SET
            name = COALESCE($1, name),
            measurement_unit = COALESCE($2, measurement_unit)
        WHERE id = $3
        RETURNING *
    ",
    )
    .bind(&changes.name)
    .bind(&changes.measurement_unit)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(ApiError::NotFound)
}

/// Recipes using the ingredient lose the row through the cascade.
pub async fn delete_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub async fn find_missing_ingredients(
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<Id>, ApiError> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    let found: Vec<Id> = found.into_iter().map(|(id,)| id).collect();
    Ok(ids.iter().filter(|id| !found.contains(id)).copied().collect())
}

/// `name,measurement_unit` records, no header. Returns the rows and the line numbers of
/// records that could not be read or do not have exactly two non-empty fields.
pub fn parse_ingredient_csv(data: &str) -> (Vec<(String, String)>, Vec<u64>) {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data.as_bytes());

    let mut rows = vec![];
    let mut skipped = vec![];

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Unreadable CSV record: {e}");
                skipped.push(e.position().map(|pos| pos.line()).unwrap_or(0));
                continue;
            }
        };
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);

        match (record.len(), record.get(0), record.get(1)) {
            (2, Some(name), Some(unit)) if !name.is_empty() && !unit.is_empty() => {
                rows.push((name.to_owned(), unit.to_owned()));
            }
            _ => skipped.push(line),
        }
    }

    (rows, skipped)
}

/// Bulk insert; already known (name, unit) pairs are left alone. Returns how many were added.
pub async fn import_ingredients(
    rows: &[(String, String)],
    pool: &Pool<Postgres>,
) -> Result<u64, ApiError> {
    let (names, units): (Vec<String>, Vec<String>) = rows.iter().cloned().unzip();

    let result = sqlx::query(
        "
        INSERT INTO ingredients (name, measurement_unit)
        SELECT * FROM UNNEST($1::VARCHAR[], $2::VARCHAR[])
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(names)
    .bind(units)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
