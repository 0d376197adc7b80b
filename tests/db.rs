//! End-to-end flows against a real database. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use serde_json::{json, Value};
use sqlx::PgPool;
use tempfile::TempDir;
use warp::http::StatusCode;

use foodgram::{
    actions::{ingredients, users},
    config::Config,
    routes::routes,
    schema::{Id, UserRole},
    state::AppState,
    validation::NewUserPayload,
};

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABAQMAAAAl21bKAAAAA1BMVEUAAACnej3aAAAAAXRSTlMAQObYZgAAAApJREFUCNdjYAAAAAIAAeIhvDMAAAAASUVORK5CYII=";

struct TestApp {
    state: AppState,
    media: TempDir,
}

impl TestApp {
    fn new(pool: PgPool) -> Self {
        let media = tempfile::tempdir().unwrap();
        let media_root = media.path().to_string_lossy().to_string();
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://unused".to_owned()),
            "FOODGRAM_SECRET" => Some("test-secret".to_owned()),
            "FOODGRAM_MEDIA_ROOT" => Some(media_root.clone()),
            _ => None,
        })
        .unwrap();

        Self {
            state: AppState::new(pool, &config).unwrap(),
            media,
        }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        payload: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Token {token}"));
        }
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        let response = request.reply(&routes(self.state.clone())).await;

        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), body)
    }

    async fn user(&self, username: &str, role: UserRole) -> (Id, String) {
        let email = format!("{username}@example.com");
        let user = NewUserPayload {
            email: Some(email.clone()),
            username: Some(username.to_owned()),
            first_name: Some("Test".to_owned()),
            last_name: Some("User".to_owned()),
            password: Some("password123".to_owned()),
        }
        .validate()
        .unwrap();
        let account = users::register_user(&user, role, &self.state.pool).await.unwrap();

        let (status, body) = self
            .request(
                "POST",
                "/api/auth/token/login/",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (account.id, body["auth_token"].as_str().unwrap().to_owned())
    }

    async fn ingredient(&self, name: &str) -> Id {
        let rows = ingredients::list_ingredients(Some(name), &self.state.pool)
            .await
            .unwrap();
        rows.first().unwrap().id
    }

    /// Where a `/media/...` URL is stored on disk.
    fn media_file(&self, url: &str) -> std::path::PathBuf {
        self.media.path().join(url.trim_start_matches("/media/"))
    }

    async fn tag(&self, slug: &str) -> Id {
        sqlx::query_scalar(
            "INSERT INTO tags (name, color, slug) VALUES (INITCAP($1), '#49B64E', $1) RETURNING id",
        )
        .bind(slug)
        .fetch_one(&self.state.pool)
        .await
        .unwrap()
    }

    async fn recipe(&self, token: &str, name: &str, tags: &[Id], ingredients: &[(Id, i32)]) -> Value {
        let ingredients: Vec<Value> = ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect();
        let (status, recipe) = self
            .request(
                "POST",
                "/api/recipes/",
                Some(token),
                Some(json!({
                    "ingredients": ingredients,
                    "tags": tags,
                    "image": PIXEL,
                    "name": name,
                    "text": "Cook it.",
                    "cooking_time": 10,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{recipe}");
        recipe
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn shopping_list_sums_cart_ingredients(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, admin) = app.user("chef", UserRole::Admin).await;

    let (status, tag) = app
        .request(
            "POST",
            "/api/tags/",
            Some(&admin),
            Some(json!({ "name": "Breakfast", "color": "#E26C2D", "slug": "breakfast" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{tag}");

    let rows = vec![
        ("flour".to_owned(), "g".to_owned()),
        ("milk".to_owned(), "ml".to_owned()),
    ];
    assert_eq!(ingredients::import_ingredients(&rows, &app.state.pool).await.unwrap(), 2);
    assert_eq!(ingredients::import_ingredients(&rows, &app.state.pool).await.unwrap(), 0);
    let flour = app.ingredient("flour").await;
    let milk = app.ingredient("milk").await;

    let mut recipe_ids = vec![];
    for (name, amount) in [("Pancakes", 200), ("Bread", 300)] {
        let (status, recipe) = app
            .request(
                "POST",
                "/api/recipes/",
                Some(&admin),
                Some(json!({
                    "ingredients": [{ "id": flour, "amount": amount }, { "id": milk, "amount": 100 }],
                    "tags": [tag["id"]],
                    "image": PIXEL,
                    "name": name,
                    "text": "Mix and bake.",
                    "cooking_time": 20,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{recipe}");
        assert!(recipe["image"]
            .as_str()
            .unwrap()
            .starts_with("/media/recipes/images/"));
        assert_eq!(recipe["ingredients"][0]["amount"], amount);
        recipe_ids.push(recipe["id"].as_i64().unwrap());
    }

    let (status, _) = app
        .request("GET", "/api/recipes/download_shopping_cart/", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for id in &recipe_ids {
        let path = format!("/api/recipes/{id}/shopping_cart/");
        let (status, short) = app.request("POST", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(short["id"], *id);
    }

    let response = warp::test::request()
        .method("GET")
        .path("/api/recipes/download_shopping_cart/")
        .header("authorization", format!("Token {admin}"))
        .reply(&routes(app.state.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(text.contains("flour (g): 500"), "{text}");
    assert!(text.contains("milk (ml): 200"), "{text}");

    let (status, page) = app
        .request("GET", "/api/recipes/?is_in_shopping_cart=1&limit=1", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"][0]["name"], "Bread");
    assert_eq!(page["next"], "/api/recipes/?is_in_shopping_cart=1&page=2&limit=1");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn favorites_reject_duplicates_and_respect_ownership(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, author) = app.user("author", UserRole::User).await;
    let (_, reader) = app.user("reader", UserRole::User).await;

    let tag: Id = sqlx::query_scalar(
        "INSERT INTO tags (name, color, slug) VALUES ('Lunch', '#49B64E', 'lunch') RETURNING id",
    )
    .fetch_one(&app.state.pool)
    .await
    .unwrap();
    ingredients::import_ingredients(&[("rice".to_owned(), "g".to_owned())], &app.state.pool)
        .await
        .unwrap();
    let rice = app.ingredient("rice").await;

    let (status, recipe) = app
        .request(
            "POST",
            "/api/recipes/",
            Some(&author),
            Some(json!({
                "ingredients": [{ "id": rice, "amount": 150 }],
                "tags": [tag],
                "image": PIXEL,
                "name": "Rice bowl",
                "text": "Boil the rice.",
                "cooking_time": 25,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{recipe}");
    let id = recipe["id"].as_i64().unwrap();
    let favorite = format!("/api/recipes/{id}/favorite/");

    assert_eq!(app.request("POST", &favorite, Some(&reader), None).await.0, StatusCode::CREATED);
    assert_eq!(app.request("POST", &favorite, Some(&reader), None).await.0, StatusCode::BAD_REQUEST);

    let (_, page) = app
        .request("GET", "/api/recipes/?is_favorited=true", Some(&reader), None)
        .await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["is_favorited"], true);

    assert_eq!(app.request("DELETE", &favorite, Some(&reader), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.request("DELETE", &favorite, Some(&reader), None).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.request("POST", "/api/recipes/999999/favorite/", Some(&reader), None).await.0,
        StatusCode::NOT_FOUND
    );

    let detail = format!("/api/recipes/{id}/");
    let (status, _) = app
        .request("PATCH", &detail, Some(&reader), Some(json!({ "name": "Stolen" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .request("PATCH", &detail, Some(&author), Some(json!({ "cooking_time": 30 })))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["cooking_time"], 30);
    assert_eq!(updated["name"], "Rice bowl");

    let (status, _) = app
        .request(
            "PATCH",
            &detail,
            Some(&author),
            Some(json!({ "ingredients": [{ "id": 999999, "amount": 1 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.request("DELETE", &detail, Some(&author), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.request("GET", &detail, None, None).await.0, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn subscriptions_and_logout(pool: PgPool) {
    let app = TestApp::new(pool);
    let (follower_id, follower) = app.user("follower", UserRole::User).await;
    let (author_id, _) = app.user("writer", UserRole::User).await;

    let subscribe = format!("/api/users/{author_id}/subscribe/");
    let (status, body) = app.request("POST", &subscribe, Some(&follower), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 0);

    assert_eq!(app.request("POST", &subscribe, Some(&follower), None).await.0, StatusCode::BAD_REQUEST);
    let own = format!("/api/users/{follower_id}/subscribe/");
    assert_eq!(app.request("POST", &own, Some(&follower), None).await.0, StatusCode::BAD_REQUEST);

    let (_, page) = app
        .request("GET", "/api/users/subscriptions/", Some(&follower), None)
        .await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["username"], "writer");

    let (_, profile) = app
        .request("GET", &format!("/api/users/{author_id}/"), Some(&follower), None)
        .await;
    assert_eq!(profile["is_subscribed"], true);

    assert_eq!(app.request("DELETE", &subscribe, Some(&follower), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.request("DELETE", &subscribe, Some(&follower), None).await.0, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.request("POST", "/api/auth/token/logout/", Some(&follower), None).await.0,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.request("GET", "/api/users/me/", Some(&follower), None).await.0,
        StatusCode::UNAUTHORIZED
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn duplicate_registration_reports_both_fields(pool: PgPool) {
    let app = TestApp::new(pool);
    app.user("taken", UserRole::User).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "TAKEN@example.com",
                "username": "taken",
                "first_name": "Other",
                "last_name": "Person",
                "password": "password123",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"][0].is_string(), "{body}");
    assert!(body["username"][0].is_string(), "{body}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn login_drops_expired_tokens(pool: PgPool) {
    let app = TestApp::new(pool);
    let (id, _) = app.user("returning", UserRole::User).await;

    sqlx::query(
        "INSERT INTO auth_tokens (jti, user_id, expires_at) VALUES ($1, $2, NOW() - INTERVAL '1 hour')",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(id)
    .execute(&app.state.pool)
    .await
    .unwrap();

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({ "email": "returning@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (total, expired): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE expires_at <= NOW()) FROM auth_tokens WHERE user_id = $1",
    )
    .bind(id)
    .fetch_one(&app.state.pool)
    .await
    .unwrap();
    assert_eq!((total, expired), (2, 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn only_admins_manage_tags(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, user) = app.user("plain", UserRole::User).await;

    let tag = json!({ "name": "Dinner", "color": "#8775D2", "slug": "dinner" });
    let (status, _) = app.request("POST", "/api/tags/", Some(&user), Some(tag)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, tags) = app.request("GET", "/api/tags/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags, json!([]));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn ingredient_search_is_a_case_insensitive_prefix(pool: PgPool) {
    let app = TestApp::new(pool);
    let rows: Vec<(String, String)> = [("Flax", "g"), ("flour", "g"), ("Sunflower oil", "ml")]
        .iter()
        .map(|(name, unit)| (name.to_string(), unit.to_string()))
        .collect();
    ingredients::import_ingredients(&rows, &app.state.pool).await.unwrap();

    let (status, found) = app.request("GET", "/api/ingredients/?name=FL", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Flax", "flour"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn tag_filter_matches_any_slug(pool: PgPool) {
    let app = TestApp::new(pool);
    let (author_id, author) = app.user("cook", UserRole::User).await;
    ingredients::import_ingredients(&[("egg".to_owned(), "pcs".to_owned())], &app.state.pool)
        .await
        .unwrap();
    let egg = app.ingredient("egg").await;

    let breakfast = app.tag("breakfast").await;
    let dinner = app.tag("dinner").await;
    let lunch = app.tag("lunch").await;
    app.recipe(&author, "Omelette", &[breakfast], &[(egg, 2)]).await;
    app.recipe(&author, "Frittata", &[dinner, breakfast], &[(egg, 4)]).await;
    app.recipe(&author, "Egg salad", &[lunch], &[(egg, 3)]).await;

    let (status, page) = app
        .request("GET", "/api/recipes/?tags=breakfast&tags=dinner", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);

    let (_, page) = app
        .request("GET", &format!("/api/recipes/?author={author_id}&tags=lunch"), None, None)
        .await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["name"], "Egg salad");

    let (status, body) = app
        .request("GET", "/api/recipes/?tags=brunch", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["tags"][0].as_str().unwrap().contains("brunch"), "{body}");

    let (status, body) = app
        .request("GET", "/api/recipes/?author=999999", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["author"][0].is_string(), "{body}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn recipes_limit_keeps_the_full_count(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, follower) = app.user("fan", UserRole::User).await;
    let (author_id, author) = app.user("prolific", UserRole::User).await;
    ingredients::import_ingredients(&[("oats".to_owned(), "g".to_owned())], &app.state.pool)
        .await
        .unwrap();
    let oats = app.ingredient("oats").await;
    let tag = app.tag("breakfast").await;
    for name in ["Porridge", "Granola", "Flapjack"] {
        app.recipe(&author, name, &[tag], &[(oats, 80)]).await;
    }

    let (status, body) = app
        .request(
            "POST",
            &format!("/api/users/{author_id}/subscribe/?recipes_limit=2"),
            Some(&follower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipes_count"], 3);

    let (_, page) = app
        .request("GET", "/api/users/subscriptions/?recipes_limit=1", Some(&follower), None)
        .await;
    assert_eq!(page["results"][0]["recipes"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["recipes_count"], 3);

    let (_, page) = app
        .request("GET", "/api/users/subscriptions/", Some(&follower), None)
        .await;
    assert_eq!(page["results"][0]["recipes"].as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn patch_replaces_sets_and_old_image(pool: PgPool) {
    let app = TestApp::new(pool);
    let (_, author) = app.user("editor", UserRole::User).await;
    let rows = vec![
        ("flour".to_owned(), "g".to_owned()),
        ("milk".to_owned(), "ml".to_owned()),
    ];
    ingredients::import_ingredients(&rows, &app.state.pool).await.unwrap();
    let flour = app.ingredient("flour").await;
    let milk = app.ingredient("milk").await;
    let breakfast = app.tag("breakfast").await;
    let dinner = app.tag("dinner").await;

    let recipe = app.recipe(&author, "Crepes", &[breakfast], &[(flour, 100)]).await;
    let old_image = app.media_file(recipe["image"].as_str().unwrap());
    assert!(old_image.exists());

    let (status, updated) = app
        .request(
            "PATCH",
            &format!("/api/recipes/{}/", recipe["id"]),
            Some(&author),
            Some(json!({
                "tags": [dinner],
                "ingredients": [{ "id": milk, "amount": 250 }],
                "image": PIXEL,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["tags"].as_array().unwrap().len(), 1);
    assert_eq!(updated["tags"][0]["id"], dinner);
    assert_eq!(updated["ingredients"].as_array().unwrap().len(), 1);
    assert_eq!(updated["ingredients"][0]["id"], milk);
    assert_eq!(updated["ingredients"][0]["amount"], 250);
    assert_eq!(updated["name"], "Crepes");

    let new_image = app.media_file(updated["image"].as_str().unwrap());
    assert_ne!(old_image, new_image);
    assert!(new_image.exists());
    assert!(!old_image.exists());
}
