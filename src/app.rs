use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::access::{modules as module_slugs, require_module, AuthorizationGuard, ScopeHeaders};
use crate::db::SqliteAccessStore;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, branches, employees, health, modules, rbac};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub guard: AuthorizationGuard,
    pub scope_headers: Arc<ScopeHeaders>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, guard: AuthorizationGuard, scope_headers: ScopeHeaders) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            guard,
            scope_headers: Arc::new(scope_headers),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let scope_headers = ScopeHeaders::from_env()?;
    let guard = AuthorizationGuard::from_store(Arc::new(SqliteAccessStore::new(pool.clone())));

    Ok(build_router(AppState::new(pool, jwt_config, guard, scope_headers)))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let branch_routes = Router::new()
        .route("/", get(branches::list_branches).post(branches::create_branch))
        .route("/:id", get(branches::get_branch).put(branches::update_branch));

    let employee_routes = Router::new()
        .route("/", get(employees::list_employees).post(employees::create_employee))
        .route(
            "/:id",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), module_slugs::HR),
            require_module,
        ));

    let module_routes = Router::new()
        .route("/", get(modules::list_modules))
        .route("/:slug", put(modules::toggle_module));

    Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/branches", branch_routes)
        .nest("/hr/employees", employee_routes)
        .nest("/rbac", rbac::routes())
        .nest("/modules", module_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
