//! HTTP route handlers for the POS JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness
//! GET  /health/ready                           - Database readiness
//!
//! # Staff auth (session cookie)
//! POST /api/auth/login                         - Email + password (rate limited)
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Store administration
//! GET|POST   /api/users                        - Owner
//! PATCH      /api/users/{id}                   - Owner
//! GET|PATCH  /api/store                        - PATCH owner
//! GET        /api/settings                     - Free-form settings
//! GET|PUT|DELETE /api/settings/{key}           - Writes owner
//!
//! # Catalog, stock and floor
//! GET|POST   /api/products                     - Writes manager+
//! GET|PUT|DELETE /api/products/{id}
//! GET  /api/inventory
//! POST /api/inventory/{product_id}/adjust      - Manager+
//! GET  /api/inventory/{product_id}/movements
//! GET|POST   /api/tables
//! PUT|DELETE /api/tables/{id}
//! PATCH      /api/tables/{id}/status
//!
//! # Orders and notifications
//! GET|POST   /api/orders
//! GET        /api/orders/{id}
//! PATCH      /api/orders/{id}/status
//! GET  /api/notifications
//! GET  /api/notifications/unread-count
//! POST /api/notifications/{id}/read
//! POST /api/notifications/read-all
//!
//! # Licensing
//! POST /api/license/validate                   - Public, rate limited
//! GET|POST /api/licenses                       - Owner (own) / super admin (all, issue)
//! GET  /api/licenses/{id}/devices
//! POST /api/licenses/{id}/suspend|reactivate|revoke   - Super admin
//! DELETE /api/licenses/{id}/devices/{device_id}       - Owner
//!
//! # Backups and scheduled jobs
//! GET  /api/backup/download                    - Owner
//! GET  /api/backups                            - Owner
//! GET|POST /api/cron/backup                    - Bearer CRON_SECRET
//! GET|POST /api/cron/licenses                  - Bearer CRON_SECRET
//!
//! # Terminal sync (Bearer license token)
//! GET  /api/sync/catalog
//! POST /api/sync/orders
//! ```

pub mod auth;
pub mod backups;
pub mod cron;
pub mod health;
pub mod inventory;
pub mod licenses;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod settings;
pub mod store;
pub mod sync;
pub mod tables;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::{license_rate_limiter, login_rate_limiter};
use crate::state::AppState;

/// Build all routes. `trust_proxy` selects how rate limiters identify
/// clients.
pub fn routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/api", api_routes(trust_proxy))
}

fn api_routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(trust_proxy))
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", patch(users::update))
        .route("/store", get(store::show).patch(store::update))
        .route("/settings", get(settings::list))
        .route(
            "/settings/{key}",
            get(settings::show).put(settings::put).delete(settings::delete),
        )
        .merge(catalog_routes())
        .merge(order_routes())
        .merge(license_routes(trust_proxy))
        .route("/backup/download", get(backups::download))
        .route("/backups", get(backups::list))
        .route("/cron/backup", get(cron::backup).post(cron::backup))
        .route("/cron/licenses", get(cron::licenses).post(cron::licenses))
        .route("/sync/catalog", get(sync::catalog))
        .route("/sync/orders", post(sync::push_orders))
}

/// Create the staff auth routes router.
pub fn auth_routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            post(auth::login).layer(login_rate_limiter(trust_proxy)),
        )
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the product, inventory and table routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::deactivate),
        )
        .route("/inventory", get(inventory::list))
        .route("/inventory/{product_id}/adjust", post(inventory::adjust))
        .route("/inventory/{product_id}/movements", get(inventory::movements))
        .route("/tables", get(tables::list).post(tables::create))
        .route("/tables/{id}", put(tables::update).delete(tables::delete))
        .route("/tables/{id}/status", patch(tables::set_status))
}

/// Create the order and notification routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
}

/// Create the licensing routes router.
pub fn license_routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route(
            "/license/validate",
            post(licenses::validate).layer(license_rate_limiter(trust_proxy)),
        )
        .route("/licenses", get(licenses::list).post(licenses::issue))
        .route("/licenses/{id}/devices", get(licenses::devices))
        .route(
            "/licenses/{id}/devices/{device_id}",
            delete(licenses::remove_device),
        )
        .route("/licenses/{id}/suspend", post(licenses::suspend))
        .route("/licenses/{id}/reactivate", post(licenses::reactivate))
        .route("/licenses/{id}/revoke", post(licenses::revoke))
}
