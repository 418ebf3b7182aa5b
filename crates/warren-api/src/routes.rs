use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_auth;
use crate::{auth, channels, posts};

/// Build the full application router. Channel and post reads are public;
/// everything that writes (or reveals account data) sits behind the JWT
/// middleware, applied per method router so public and protected methods can
/// share a path.
pub fn router(state: AppState) -> Router {
    let auth_layer = || from_fn_with_state(state.clone(), require_auth);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/me",
            get(auth::me)
                .patch(auth::update_profile)
                .route_layer(auth_layer()),
        )
        .route(
            "/auth/password",
            post(auth::change_password).route_layer(auth_layer()),
        )
        .route(
            "/channels",
            post(channels::create_channel).route_layer(auth_layer()),
        )
        .route(
            "/channels/{channel_id}",
            patch(channels::reparent_channel)
                .delete(channels::delete_channel)
                .route_layer(auth_layer())
                .get(channels::get_channel),
        )
        .route(
            "/channels/{channel_id}/follow",
            post(channels::follow)
                .delete(channels::unfollow)
                .route_layer(auth_layer()),
        )
        .route(
            "/channels/{channel_id}/posts",
            post(posts::create_post)
                .route_layer(auth_layer())
                .get(posts::list_posts),
        )
        .route("/users/{user_id}/posts", get(posts::list_user_posts))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
