// src/handlers.rs
//! HTTP entry points. Each route maps to one storefront event and answers
//! with re-rendered markup.

use std::sync::Arc;

use axum::extract::{Form, Multipart, Path, State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use maud::Markup;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::auth_models::{AuthMode, AuthPayload};
use crate::errors::AppError;
use crate::filters::ListingQuery;
use crate::form::{CategoryDraft, ImageUpload, ListingDraft};
use crate::render::{render_app, render_grid, render_page};
use crate::state::AppState;
use crate::storefront::Storefront;

pub const CLIENT_COOKIE: &str = "client_id";

type Fragment = Result<(CookieJar, Markup), AppError>;

fn client_id(jar: CookieJar) -> (Uuid, CookieJar) {
    if let Some(id) = jar
        .get(CLIENT_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (id, jar);
    }

    let id = Uuid::new_v4();
    let cookie = Cookie::build((CLIENT_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build();
    tracing::debug!("Issued client id {}", id);
    (id, jar.add(cookie))
}

/// Finds or starts this browser's storefront, locks it and applies any
/// session change pushed since its last event.
async fn storefront_for(
    state: &AppState,
    jar: CookieJar,
) -> Result<(CookieJar, OwnedMutexGuard<Storefront>), AppError> {
    let (id, jar) = client_id(jar);
    let gateway = state.gateway.clone();

    let client: Arc<Mutex<Storefront>> = state
        .clients
        .try_get_with(id, async move {
            let mut store = Storefront::new(&gateway);
            store.start().await?;
            tracing::info!("Started storefront for client {}", id);
            Ok::<_, AppError>(Arc::new(Mutex::new(store)))
        })
        .await
        .map_err(|err| {
            tracing::error!("Could not start storefront for client {}: {}", id, err);
            AppError::Internal(format!("could not start the storefront: {err}"))
        })?;

    let mut store = client.lock_owned().await;
    store.sync_session().await?;
    Ok((jar, store))
}

pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, store) = storefront_for(&state, jar).await?;
    Ok((jar, render_page(&store)))
}

// ---- Auth ----

pub async fn open_login(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.open_auth(AuthMode::Login);
    Ok((jar, render_app(&store)))
}

pub async fn open_register(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.open_auth(AuthMode::Register);
    Ok((jar, render_app(&store)))
}

pub async fn close_auth(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.close_auth();
    Ok((jar, render_app(&store)))
}

pub async fn submit_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<AuthPayload>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.submit_auth(payload).await?;
    Ok((jar, render_app(&store)))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.logout().await?;
    Ok((jar, render_app(&store)))
}

// ---- Listings ----

pub async fn new_listing(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.new_listing();
    Ok((jar, render_app(&store)))
}

pub async fn close_listing_form(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.close_listing_form();
    Ok((jar, render_app(&store)))
}

pub async fn edit_listing(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.edit_listing(&id)?;
    Ok((jar, render_app(&store)))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.request_listing_deletion(&id)?;
    Ok((jar, render_app(&store)))
}

/// Multipart body: `title`, `price`, `category`, `description` and an
/// optional `image` file. The form's mode comes from the storefront, not
/// from the request.
pub async fn save_listing(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Fragment {
    let mut draft = ListingDraft::default();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(field_name) = field.name().map(str::to_string) else {
            tracing::warn!("Skipping unnamed multipart field");
            continue;
        };

        match field_name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if !file_name.is_empty() && !bytes.is_empty() {
                    tracing::debug!("Received image '{}' ({} bytes)", file_name, bytes.len());
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "title" => draft.title = field.text().await?,
            "price" => draft.price = field.text().await?,
            "category" => draft.category = field.text().await?,
            "description" => draft.description = field.text().await?,
            _ => {}
        }
    }

    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.save_listing(draft, image).await?;
    Ok((jar, render_app(&store)))
}

// ---- Deletion ----

pub async fn confirm_deletion(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.confirm_deletion().await?;
    Ok((jar, render_app(&store)))
}

pub async fn cancel_deletion(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.cancel_deletion();
    Ok((jar, render_app(&store)))
}

// ---- Filters ----

pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(query): Form<ListingQuery>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.set_search(query.search);
    Ok((jar, render_grid(&store.grid())))
}

pub async fn filter_category(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(query): Form<ListingQuery>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.set_category_filter(query.category);
    Ok((jar, render_grid(&store.grid())))
}

pub async fn clear_filters(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.clear_filters();
    Ok((jar, render_app(&store)))
}

// ---- Admin ----

pub async fn open_admin(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.open_admin()?;
    Ok((jar, render_app(&store)))
}

pub async fn close_admin(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.close_admin();
    Ok((jar, render_app(&store)))
}

pub async fn add_category(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(draft): Form<CategoryDraft>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.add_category(draft).await?;
    Ok((jar, render_app(&store)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.request_category_deletion(&id)?;
    Ok((jar, render_app(&store)))
}

pub async fn dismiss_notice(State(state): State<AppState>, jar: CookieJar) -> Fragment {
    let (jar, mut store) = storefront_for(&state, jar).await?;
    store.dismiss_notice();
    Ok((jar, render_app(&store)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_browsers_get_a_client_cookie() {
        let (id, jar) = client_id(CookieJar::new());
        let cookie = jar.get(CLIENT_COOKIE).unwrap();
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn known_client_keeps_its_id() {
        let known = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(CLIENT_COOKIE, known.to_string()));
        let (id, _) = client_id(jar);
        assert_eq!(id, known);
    }

    #[test]
    fn garbage_cookie_is_replaced() {
        let jar = CookieJar::new().add(Cookie::new(CLIENT_COOKIE, "not-a-uuid"));
        let (id, jar) = client_id(jar);
        assert_eq!(jar.get(CLIENT_COOKIE).unwrap().value(), id.to_string());
    }

    #[tokio::test]
    async fn storefront_is_reused_per_client() {
        let backend = crate::gateway::memory::MemoryBackend::new();
        let state = AppState::new(backend.gateway(), std::time::Duration::from_secs(60));

        let (jar, mut store) = storefront_for(&state, CookieJar::new()).await.unwrap();
        store.set_search("lamp");
        drop(store);

        let (_, store) = storefront_for(&state, jar).await.unwrap();
        assert_eq!(store.query().search, "lamp");
    }
}
