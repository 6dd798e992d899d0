use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    access::{self, RecipeRepos},
    dto::{
        AttrResponse, CreateAttrRequest, RecipeDetail, RecipeImageResponse, RecipeListItem,
        RecipeRequest,
    },
    repo::AttrRepo,
    upload::{store_recipe_image, UploadItem},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppJson},
    state::AppState,
};

// --- public routers ---

pub fn attr_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/tags/", get(list_tags).post(create_tag))
        .route(
            "/recipe/ingredients/",
            get(list_ingredients).post(create_ingredient),
        )
}

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/recipes/", get(list_recipes).post(create_recipe))
        .route(
            "/recipe/recipes/:id/",
            get(get_recipe).put(replace_recipe).patch(patch_recipe),
        )
        .route(
            "/recipe/recipes/:id/upload-image/",
            post(upload_image).layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB
        )
}

// --- tags & ingredients ---

async fn list_attrs(repo: &dyn AttrRepo, user_id: Uuid) -> Result<Json<Vec<AttrResponse>>, AppError> {
    let rows = access::list_for_principal(repo, user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

async fn create_attr(
    repo: &dyn AttrRepo,
    user_id: Uuid,
    body: CreateAttrRequest,
) -> Result<(StatusCode, Json<AttrResponse>), AppError> {
    let attr = access::create_for_principal(repo, user_id, body.name).await?;
    Ok((StatusCode::CREATED, Json(attr.into())))
}

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AttrResponse>>, AppError> {
    list_attrs(state.tags.as_ref(), user_id).await
}

#[instrument(skip(state))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CreateAttrRequest>,
) -> Result<(StatusCode, Json<AttrResponse>), AppError> {
    create_attr(state.tags.as_ref(), user_id, body).await
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AttrResponse>>, AppError> {
    list_attrs(state.ingredients.as_ref(), user_id).await
}

#[instrument(skip(state))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CreateAttrRequest>,
) -> Result<(StatusCode, Json<AttrResponse>), AppError> {
    create_attr(state.ingredients.as_ref(), user_id, body).await
}

// --- recipes ---

fn repos(state: &AppState) -> RecipeRepos<'_> {
    RecipeRepos {
        recipes: state.recipes.as_ref(),
        tags: state.tags.as_ref(),
        ingredients: state.ingredients.as_ref(),
    }
}

/// Malformed ids get the same answer as ids of someone else's recipe.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<RecipeListItem>>, AppError> {
    let recipes = access::list_recipes_for_principal(state.recipes.as_ref(), user_id).await?;
    Ok(Json(recipes.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<RecipeRequest>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeDetail>), AppError> {
    let new = body.into_new()?;
    let recipe = access::create_recipe_for_principal(&repos(&state), user_id, new).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/recipe/recipes/{}/", recipe.row.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(recipe.into())))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecipeDetail>, AppError> {
    let id = parse_id(&id)?;
    let recipe = access::retrieve_detail(state.recipes.as_ref(), user_id, id).await?;
    Ok(Json(recipe.into()))
}

#[instrument(skip(state, body))]
pub async fn replace_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<RecipeRequest>,
) -> Result<Json<RecipeDetail>, AppError> {
    let id = parse_id(&id)?;
    let changes = body.into_replacement()?;
    let recipe = access::update_for_principal(&repos(&state), user_id, id, changes).await?;
    Ok(Json(recipe.into()))
}

#[instrument(skip(state, body))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<RecipeRequest>,
) -> Result<Json<RecipeDetail>, AppError> {
    let id = parse_id(&id)?;
    let changes = body.into_patch()?;
    let recipe = access::update_for_principal(&repos(&state), user_id, id, changes).await?;
    Ok(Json(recipe.into()))
}

/// POST /recipe/recipes/{id}/upload-image/ (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    mut mp: Multipart,
) -> Result<Json<RecipeImageResponse>, AppError> {
    let id = parse_id(&id)?;
    let bad_body = |e: axum::extract::multipart::MultipartError| AppError::invalid("image", e.body_text());

    while let Some(field) = mp.next_field().await.map_err(bad_body)? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field.bytes().await.map_err(bad_body)?;
        if body.is_empty() {
            return Err(AppError::invalid("image", "The submitted file is empty."));
        }

        let item = UploadItem {
            filename: &filename,
            content_type: &content_type,
            body,
        };
        let image = store_recipe_image(&state, user_id, id, item).await?;
        return Ok(Json(RecipeImageResponse { id, image }));
    }
    Err(AppError::required("image"))
}
