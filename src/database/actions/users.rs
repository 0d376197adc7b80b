use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{JwtSessionData, SessionData, TokenSigner},
    },
    error::{ApiError, ValidationErrors},
    pagination::PageRequest,
    schema::{Id, User, UserAccount, UserProfile, UserProfileRow, UserRole},
    validation::NewUser,
};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_email(
    email: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_profile(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserProfile>, ApiError> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(id)
    .bind(viewer)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn fetch_profiles(
    viewer: Option<Id>,
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<UserProfile>, i64), ApiError> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $1) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(|row| row.profile).collect(), total_count))
}

/// Creates a user; the password is hashed here.
pub async fn register_user(
    user: &NewUser,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<UserAccount, ApiError> {
    let (email_taken, username_taken): (Option<bool>, Option<bool>) = sqlx::query_as(
        "
        SELECT bool_or(LOWER(email) = LOWER($1)), bool_or(username = $2)
        FROM users
        WHERE LOWER(email) = LOWER($1) OR username = $2
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .fetch_one(pool)
    .await?;

    let mut errors = ValidationErrors::new();
    if email_taken.unwrap_or(false) {
        errors.add("email", "This email already used.");
    }
    if username_taken.unwrap_or(false) {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    let password = hash_password(&user.password)?;
    let account: UserAccount = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING email, id, username, first_name, last_name
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .bind(role)
    .fetch_one(pool)
    .await?;

    log::info!("Registered user {} ({})", account.username, account.id);
    Ok(account)
}

pub async fn set_password(
    user_id: Id,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let user = get_user_by_id(user_id, pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !verify_password(current_password, &user.password)? {
        return Err(ValidationErrors::single("current_password", "Invalid password.").into());
    }

    let password = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Verifies credentials and records a new token.
pub async fn login_user(
    email: &str,
    password: &str,
    tokens: &TokenSigner,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let invalid = || ApiError::bad_request("Unable to log in with provided credentials.");

    let user = get_user_by_email(email, pool).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    let (token, claims) = tokens.generate(user.id)?;
    let expires_at = claims
        .expires_at()
        .ok_or_else(|| ApiError::Internal("Token expiry out of range".to_owned()))?;

    let mut tr = pool.begin().await?;
    let expired = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(user.id)
        .execute(&mut *tr)
        .await?;
    sqlx::query("INSERT INTO auth_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(claims.jti)
        .bind(user.id)
        .bind(expires_at)
        .execute(&mut *tr)
        .await?;
    tr.commit().await?;

    if expired.rows_affected() > 0 {
        log::debug!(
            "Dropped {} expired tokens of user {}",
            expired.rows_affected(),
            user.id
        );
    }
    Ok(token)
}

pub async fn logout_user(session: &SessionData, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM auth_tokens WHERE jti = $1")
        .bind(session.jti)
        .execute(pool)
        .await?;

    Ok(())
}

/// Maps verified claims to a live session; revoked tokens and deleted users are rejected.
pub async fn resolve_session(
    claims: &JwtSessionData,
    pool: &Pool<Postgres>,
) -> Result<SessionData, ApiError> {
    let row: Option<(Id, UserRole)> = sqlx::query_as(
        "
        SELECT u.id, u.role
        FROM auth_tokens t
        INNER JOIN users u ON u.id = t.user_id
        WHERE t.jti = $1 AND t.user_id = $2 AND t.expires_at > NOW()
    ",
    )
    .bind(claims.jti)
    .bind(claims.user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((user_id, role)) => Ok(SessionData::new(user_id, claims.jti, role)),
        None => Err(ApiError::InvalidToken),
    }
}
